//! Broadcast playlist database operations

use crate::archive::RawPlaylist;
use mjz_common::db::BroadcastPlaylist;
use mjz_common::Result;
use sqlx::SqliteConnection;

const COLUMNS: &str = "id, external_id, timeslot, title, description, episode_id";

/// Insert a scraped playlist, returning its row id
///
/// A playlist already present (same archive id or timeslot) fails with a
/// unique violation.
pub async fn insert_playlist(conn: &mut SqliteConnection, playlist: &RawPlaylist) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO broadcast_playlists (external_id, timeslot, title, description) VALUES (?, ?, ?, ?)",
    )
    .bind(playlist.external_id)
    .bind(playlist.timeslot)
    .bind(&playlist.title)
    .bind(&playlist.description)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Row id for an archive id
pub async fn find_playlist_id(conn: &mut SqliteConnection, external_id: i64) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM broadcast_playlists WHERE external_id = ?")
        .bind(external_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(id)
}

/// Most recently aired playlist in the store
pub async fn latest_playlist(conn: &mut SqliteConnection) -> Result<Option<BroadcastPlaylist>> {
    let playlist = sqlx::query_as::<_, BroadcastPlaylist>(&format!(
        "SELECT {} FROM broadcast_playlists ORDER BY timeslot DESC LIMIT 1",
        COLUMNS
    ))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(playlist)
}

/// Every playlist with its stored spin count, newest first
pub async fn playlists_with_spin_counts(
    conn: &mut SqliteConnection,
) -> Result<Vec<(BroadcastPlaylist, i64)>> {
    let playlists = sqlx::query_as::<_, BroadcastPlaylist>(&format!(
        "SELECT {} FROM broadcast_playlists ORDER BY timeslot DESC",
        COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    let mut counted = Vec::with_capacity(playlists.len());
    for playlist in playlists {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM spins WHERE playlist_id = ?")
            .bind(playlist.id)
            .fetch_one(&mut *conn)
            .await?;
        counted.push((playlist, count));
    }

    Ok(counted)
}

/// Playlists not yet assigned to an episode, newest first
pub async fn ungrouped_playlists(conn: &mut SqliteConnection) -> Result<Vec<BroadcastPlaylist>> {
    let playlists = sqlx::query_as::<_, BroadcastPlaylist>(&format!(
        "SELECT {} FROM broadcast_playlists WHERE episode_id IS NULL ORDER BY timeslot DESC, id DESC",
        COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    Ok(playlists)
}

/// Playlists of one episode in association order
pub async fn playlists_for_episode(
    conn: &mut SqliteConnection,
    episode_id: i64,
) -> Result<Vec<BroadcastPlaylist>> {
    let playlists = sqlx::query_as::<_, BroadcastPlaylist>(&format!(
        "SELECT {} FROM broadcast_playlists WHERE episode_id = ? ORDER BY id",
        COLUMNS
    ))
    .bind(episode_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(playlists)
}

/// Assign a playlist to an episode
pub async fn set_episode(conn: &mut SqliteConnection, playlist_id: i64, episode_id: i64) -> Result<()> {
    sqlx::query("UPDATE broadcast_playlists SET episode_id = ? WHERE id = ?")
        .bind(episode_id)
        .bind(playlist_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mjz_common::db::init_memory_database;

    fn raw(external_id: i64, day: u32) -> RawPlaylist {
        RawPlaylist {
            external_id,
            timeslot: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(20, 0, 0)
                .unwrap(),
            title: format!("Show {}", external_id),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_latest() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        insert_playlist(&mut conn, &raw(1, 6)).await.unwrap();
        insert_playlist(&mut conn, &raw(3, 20)).await.unwrap();
        insert_playlist(&mut conn, &raw(2, 13)).await.unwrap();

        let latest = latest_playlist(&mut conn).await.unwrap().unwrap();
        assert_eq!(latest.external_id, 3);
        assert_eq!(latest.timeslot, raw(3, 20).timeslot);
        assert!(find_playlist_id(&mut conn, 2).await.unwrap().is_some());
        assert!(find_playlist_id(&mut conn, 9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_timeslot_is_unique_violation() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        insert_playlist(&mut conn, &raw(1, 6)).await.unwrap();
        let err = insert_playlist(&mut conn, &raw(2, 6)).await.unwrap_err();

        assert!(err.is_unique_violation());
    }
}
