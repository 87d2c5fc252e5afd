//! External playlist database operations

use chrono::{NaiveDateTime, Utc};
use mjz_common::db::ExternalPlaylist;
use mjz_common::Result;
use sqlx::SqliteConnection;

const COLUMNS: &str = "id, external_id, episode_id, name, description, synced_at";

/// External playlist of an episode, if one was synthesized
pub async fn find_by_episode(
    conn: &mut SqliteConnection,
    episode_id: i64,
) -> Result<Option<ExternalPlaylist>> {
    let playlist = sqlx::query_as::<_, ExternalPlaylist>(&format!(
        "SELECT {} FROM external_playlists WHERE episode_id = ?",
        COLUMNS
    ))
    .bind(episode_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(playlist)
}

/// Record a playlist created in the catalog
///
/// A second playlist for the same episode fails with a unique violation.
pub async fn insert_external_playlist(
    conn: &mut SqliteConnection,
    external_id: &str,
    episode_id: i64,
    name: &str,
    description: &str,
) -> Result<ExternalPlaylist> {
    let result = sqlx::query(
        "INSERT INTO external_playlists (external_id, episode_id, name, description) VALUES (?, ?, ?, ?)",
    )
    .bind(external_id)
    .bind(episode_id)
    .bind(name)
    .bind(description)
    .execute(&mut *conn)
    .await?;

    Ok(ExternalPlaylist {
        id: result.last_insert_rowid(),
        external_id: external_id.to_string(),
        episode_id,
        name: name.to_string(),
        description: description.to_string(),
        synced_at: None,
    })
}

pub async fn insert_item(
    conn: &mut SqliteConnection,
    playlist_id: i64,
    position: i64,
    song_id: i64,
) -> Result<()> {
    sqlx::query("INSERT INTO playlist_items (playlist_id, position, song_id) VALUES (?, ?, ?)")
        .bind(playlist_id)
        .bind(position)
        .bind(song_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Catalog id of each item's song in position order (None for placeholders)
pub async fn item_catalog_ids(
    conn: &mut SqliteConnection,
    playlist_id: i64,
) -> Result<Vec<(i64, Option<String>)>> {
    let rows = sqlx::query_as::<_, (i64, Option<String>)>(
        r#"
        SELECT i.position, s.catalog_id FROM playlist_items i
        JOIN songs s ON s.id = i.song_id
        WHERE i.playlist_id = ?
        ORDER BY i.position
        "#,
    )
    .bind(playlist_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Record that the catalog accepted the full track list, returning the
/// recorded time
pub async fn mark_synced(conn: &mut SqliteConnection, playlist_id: i64) -> Result<NaiveDateTime> {
    let synced_at = Utc::now().naive_utc();
    sqlx::query("UPDATE external_playlists SET synced_at = ? WHERE id = ?")
        .bind(synced_at)
        .bind(playlist_id)
        .execute(&mut *conn)
        .await?;

    Ok(synced_at)
}

/// Playlists whose track list never reached the catalog
pub async fn unsynced_playlists(conn: &mut SqliteConnection) -> Result<Vec<ExternalPlaylist>> {
    let playlists = sqlx::query_as::<_, ExternalPlaylist>(&format!(
        "SELECT {} FROM external_playlists WHERE synced_at IS NULL ORDER BY id",
        COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    Ok(playlists)
}
