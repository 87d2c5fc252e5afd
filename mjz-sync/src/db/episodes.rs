//! Episode database operations

use mjz_common::db::Episode;
use mjz_common::Result;
use sqlx::SqliteConnection;

/// Insert an episode, returning it
///
/// Numbers are unique; reusing one fails with a unique violation.
pub async fn insert_episode(conn: &mut SqliteConnection, number: i64) -> Result<Episode> {
    let result = sqlx::query("INSERT INTO episodes (number) VALUES (?)")
        .bind(number)
        .execute(&mut *conn)
        .await?;

    Ok(Episode {
        id: result.last_insert_rowid(),
        number,
    })
}

pub async fn find_by_number(conn: &mut SqliteConnection, number: i64) -> Result<Option<Episode>> {
    let episode = sqlx::query_as::<_, Episode>("SELECT id, number FROM episodes WHERE number = ?")
        .bind(number)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(episode)
}

/// Episodes that have no external playlist yet, lowest number first
pub async fn episodes_without_external_playlist(conn: &mut SqliteConnection) -> Result<Vec<Episode>> {
    let episodes = sqlx::query_as::<_, Episode>(
        r#"
        SELECT e.id, e.number FROM episodes e
        WHERE NOT EXISTS (SELECT 1 FROM external_playlists x WHERE x.episode_id = e.id)
        ORDER BY e.number
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(episodes)
}
