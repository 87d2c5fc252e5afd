//! Database initialization
//!
//! Opens (or creates) the SQLite store and creates the schema. Every
//! statement is idempotent, so this runs on each start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open the database at `db_path`, creating file and tables if needed
///
/// Foreign keys are enforced on every connection (sqlx default).
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    tracing::debug!("Connecting to database: {}", db_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// The pool never recycles its connection, which would discard the data.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_episodes_table(pool).await?;
    create_broadcast_playlists_table(pool).await?;
    create_songs_table(pool).await?;
    create_spins_table(pool).await?;
    create_external_playlists_table(pool).await?;
    create_playlist_items_table(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime key-value pairs, e.g. a rotated catalog refresh token.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_episodes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS episodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            number INTEGER NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_broadcast_playlists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS broadcast_playlists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            timeslot TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL DEFAULT '',
            description TEXT,
            episode_id INTEGER REFERENCES episodes(id),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_broadcast_playlists_episode ON broadcast_playlists(episode_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_songs_table(pool: &SqlitePool) -> Result<()> {
    // UNIQUE ignores NULLs, so placeholders never collide
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            catalog_id TEXT UNIQUE,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            album TEXT,
            year INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_title_artist ON songs(title, artist)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_spins_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS spins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            playlist_id INTEGER NOT NULL REFERENCES broadcast_playlists(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            album TEXT,
            year INTEGER,
            start_time TEXT NOT NULL,
            song_id INTEGER REFERENCES songs(id),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_spins_playlist ON spins(playlist_id, position)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_spins_song ON spins(song_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_external_playlists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS external_playlists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL UNIQUE,
            episode_id INTEGER NOT NULL UNIQUE REFERENCES episodes(id),
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            synced_at TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_playlist_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlist_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            playlist_id INTEGER NOT NULL REFERENCES external_playlists(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            song_id INTEGER NOT NULL REFERENCES songs(id),
            UNIQUE(playlist_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_memory_database_has_all_tables() {
        let pool = init_memory_database().await.unwrap();

        assert_eq!(
            table_names(&pool).await,
            vec![
                "broadcast_playlists",
                "episodes",
                "external_playlists",
                "playlist_items",
                "settings",
                "songs",
                "spins",
            ]
        );
    }

    #[tokio::test]
    async fn test_init_database_creates_file_and_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("mondojazz.db");

        let pool = init_database(&db_path).await.unwrap();
        assert!(db_path.exists());
        pool.close().await;

        // Second open runs every CREATE again without error
        let pool = init_database(&db_path).await.unwrap();
        assert_eq!(table_names(&pool).await.len(), 7);
    }

    #[tokio::test]
    async fn test_placeholder_songs_do_not_collide() {
        let pool = init_memory_database().await.unwrap();

        for _ in 0..2 {
            sqlx::query("INSERT INTO songs (catalog_id, artist, title) VALUES (NULL, 'A', 'T')")
                .execute(&pool)
                .await
                .unwrap();
        }

        sqlx::query("INSERT INTO songs (catalog_id, artist, title) VALUES ('x1', 'A', 'T')")
            .execute(&pool)
            .await
            .unwrap();
        let dup = sqlx::query("INSERT INTO songs (catalog_id, artist, title) VALUES ('x1', 'B', 'U')")
            .execute(&pool)
            .await;

        let err = crate::Error::from(dup.unwrap_err());
        assert!(err.is_unique_violation());
    }
}
