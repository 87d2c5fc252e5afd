//! Catalog credential resolution
//!
//! The refresh token resolves Database → ENV → TOML, since the database
//! holds whatever the last `authorize` run or token rotation produced. The
//! application id and secret resolve ENV → TOML.

use crate::catalog::auth::CatalogCredentials;
use crate::db::settings;
use mjz_common::config::{load_toml_config, write_toml_config, TomlConfig};
use mjz_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{info, warn};

pub const CLIENT_ID_ENV: &str = "MJZ_CATALOG_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "MJZ_CATALOG_CLIENT_SECRET";
pub const REFRESH_TOKEN_ENV: &str = "MJZ_CATALOG_REFRESH_TOKEN";

/// Validate a credential value (non-empty, non-whitespace)
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// First valid candidate in priority order, warning when several are set
fn pick(name: &str, candidates: Vec<(&'static str, Option<String>)>) -> Option<String> {
    let valid: Vec<(&'static str, String)> = candidates
        .into_iter()
        .filter_map(|(source, value)| value.filter(|v| is_valid_value(v)).map(|v| (source, v)))
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(source, _)| *source).collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            sources[0]
        );
    }

    let (source, value) = valid.into_iter().next()?;
    info!("{} loaded from {}", name, source);
    Some(value)
}

/// Resolve the application id and secret
///
/// **Priority:** ENV → TOML
pub fn resolve_client_credentials(toml_config: &TomlConfig) -> Result<(String, String)> {
    let client_id = pick(
        "Catalog client id",
        vec![
            ("environment", std::env::var(CLIENT_ID_ENV).ok()),
            ("TOML", toml_config.catalog.client_id.clone()),
        ],
    );
    let client_secret = pick(
        "Catalog client secret",
        vec![
            ("environment", std::env::var(CLIENT_SECRET_ENV).ok()),
            ("TOML", toml_config.catalog.client_secret.clone()),
        ],
    );

    match (client_id, client_secret) {
        (Some(id), Some(secret)) => Ok((id, secret)),
        _ => Err(Error::Config(format!(
            "Catalog client id and secret not configured. Set {} and {}, or \
             client_id and client_secret under [catalog] in the config file.",
            CLIENT_ID_ENV, CLIENT_SECRET_ENV
        ))),
    }
}

/// Resolve the refresh token
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_refresh_token(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<String> {
    let db_token = settings::get_catalog_refresh_token(db).await?;

    pick(
        "Catalog refresh token",
        vec![
            ("database", db_token),
            ("environment", std::env::var(REFRESH_TOKEN_ENV).ok()),
            ("TOML", toml_config.catalog.refresh_token.clone()),
        ],
    )
    .ok_or_else(|| {
        Error::Config(format!(
            "Catalog refresh token not configured. Run `mjz-sync authorize`, or set {}.",
            REFRESH_TOKEN_ENV
        ))
    })
}

/// Resolve everything needed to call the catalog
pub async fn resolve_catalog_credentials(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<CatalogCredentials> {
    let (client_id, client_secret) = resolve_client_credentials(toml_config)?;
    let refresh_token = resolve_refresh_token(db, toml_config).await?;

    Ok(CatalogCredentials {
        client_id,
        client_secret,
        refresh_token,
    })
}

/// Store a refresh token in the database and, as a backup, the TOML file
///
/// The database write is authoritative; a failed TOML write only warns.
pub async fn store_refresh_token(db: &Pool<Sqlite>, token: String, toml_path: &Path) -> Result<()> {
    settings::set_catalog_refresh_token(db, token.clone()).await?;

    let mut config = load_toml_config(toml_path)?;
    config.catalog.refresh_token = Some(token);

    match write_toml_config(&config, toml_path) {
        Ok(()) => info!("Refresh token written to {}", toml_path.display()),
        Err(e) => warn!("TOML write failed (database write succeeded): {}", e),
    }

    Ok(())
}
