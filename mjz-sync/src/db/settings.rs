//! Settings database operations
//!
//! Key-value accessors over the settings table.

use mjz_common::{Error, Result};
use sqlx::{Pool, Sqlite};

const CATALOG_REFRESH_TOKEN_KEY: &str = "catalog_refresh_token";

/// Get the catalog refresh token persisted by `authorize` or a rotation
///
/// **Returns:** Some(token) if set, None otherwise
pub async fn get_catalog_refresh_token(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, CATALOG_REFRESH_TOKEN_KEY).await
}

/// Persist the catalog refresh token
pub async fn set_catalog_refresh_token(db: &Pool<Sqlite>, token: String) -> Result<()> {
    set_setting(db, CATALOG_REFRESH_TOKEN_KEY, token).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((Some(value),)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: ToString,
{
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mjz_common::db::init_memory_database;

    #[tokio::test]
    async fn test_refresh_token_roundtrip_and_overwrite() {
        let pool = init_memory_database().await.unwrap();

        assert_eq!(get_catalog_refresh_token(&pool).await.unwrap(), None);

        set_catalog_refresh_token(&pool, "first".to_string()).await.unwrap();
        set_catalog_refresh_token(&pool, "second".to_string()).await.unwrap();

        assert_eq!(
            get_catalog_refresh_token(&pool).await.unwrap().as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "page_size", "many").await.unwrap();

        let result = get_setting::<u32>(&pool, "page_size").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
