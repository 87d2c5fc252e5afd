//! Spin database operations

use crate::archive::RawSpin;
use mjz_common::db::Spin;
use mjz_common::{Error, Result};
use sqlx::SqliteConnection;

const COLUMNS: &str =
    "id, external_id, playlist_id, position, artist, title, album, year, start_time, song_id";

/// Insert a scraped spin into its playlist, returning its row id
pub async fn insert_spin(
    conn: &mut SqliteConnection,
    playlist_id: i64,
    position: i64,
    spin: &RawSpin,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO spins (external_id, playlist_id, position, artist, title, album, year, start_time)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(spin.external_id)
    .bind(playlist_id)
    .bind(position)
    .bind(&spin.artist)
    .bind(&spin.title)
    .bind(&spin.album)
    .bind(spin.year)
    .bind(spin.start_time)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Spins of one playlist in airing order
pub async fn spins_for_playlist(conn: &mut SqliteConnection, playlist_id: i64) -> Result<Vec<Spin>> {
    let spins = sqlx::query_as::<_, Spin>(&format!(
        "SELECT {} FROM spins WHERE playlist_id = ? ORDER BY position",
        COLUMNS
    ))
    .bind(playlist_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(spins)
}

/// Spins not yet linked to a song, in insertion order
pub async fn unresolved_spins(conn: &mut SqliteConnection) -> Result<Vec<Spin>> {
    let spins = sqlx::query_as::<_, Spin>(&format!(
        "SELECT {} FROM spins WHERE song_id IS NULL ORDER BY id",
        COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    Ok(spins)
}

/// Load one spin by row id
#[cfg(test)]
pub async fn load_spin(conn: &mut SqliteConnection, id: i64) -> Result<Option<Spin>> {
    let spin = sqlx::query_as::<_, Spin>(&format!("SELECT {} FROM spins WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(spin)
}

/// Link an unresolved spin to a song
///
/// A spin already linked is never relinked; that is reported as an error.
pub async fn link_to_song(conn: &mut SqliteConnection, spin_id: i64, song_id: i64) -> Result<()> {
    let result = sqlx::query("UPDATE spins SET song_id = ? WHERE id = ? AND song_id IS NULL")
        .bind(song_id)
        .bind(spin_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::InvalidInput(format!(
            "Spin {} is missing or already resolved",
            spin_id
        )));
    }

    Ok(())
}
