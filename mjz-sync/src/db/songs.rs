//! Song database operations

use mjz_common::db::Song;
use mjz_common::Result;
use sqlx::SqliteConnection;

const COLUMNS: &str = "id, catalog_id, artist, title, album, year";

/// Values for a song about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSong {
    /// None for a placeholder
    pub catalog_id: Option<String>,
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub year: Option<i32>,
}

/// Insert a song, returning its row id
///
/// A second song with the same catalog id fails with a unique violation.
pub async fn insert_song(conn: &mut SqliteConnection, song: &NewSong) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO songs (catalog_id, artist, title, album, year) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&song.catalog_id)
    .bind(&song.artist)
    .bind(&song.title)
    .bind(&song.album)
    .bind(song.year)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// First song recorded with exactly this title and artist
pub async fn find_by_title_artist(
    conn: &mut SqliteConnection,
    title: &str,
    artist: &str,
) -> Result<Option<Song>> {
    let song = sqlx::query_as::<_, Song>(&format!(
        "SELECT {} FROM songs WHERE title = ? AND artist = ? ORDER BY id LIMIT 1",
        COLUMNS
    ))
    .bind(title)
    .bind(artist)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(song)
}

/// Song carrying a catalog id
pub async fn find_by_catalog_id(conn: &mut SqliteConnection, catalog_id: &str) -> Result<Option<Song>> {
    let song = sqlx::query_as::<_, Song>(&format!(
        "SELECT {} FROM songs WHERE catalog_id = ?",
        COLUMNS
    ))
    .bind(catalog_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(song)
}

/// Load one song by row id
#[cfg(test)]
pub async fn load_song(conn: &mut SqliteConnection, id: i64) -> Result<Option<Song>> {
    let song = sqlx::query_as::<_, Song>(&format!("SELECT {} FROM songs WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(song)
}
