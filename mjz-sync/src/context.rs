//! Application context
//!
//! Holds the store and configuration for one command run. Opened once at
//! startup and closed explicitly at the end, so a rotated catalog refresh
//! token is persisted and the pool shuts down cleanly.

use crate::archive::HttpArchive;
use crate::catalog::CatalogClient;
use crate::config::resolve_catalog_credentials;
use crate::db::settings;
use mjz_common::config::{database_path, resolve_root_folder, TomlConfig};
use mjz_common::db::init_database;
use mjz_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct AppContext {
    pub db: SqlitePool,
    pub config: TomlConfig,
    /// TOML file the configuration was loaded from
    pub config_path: PathBuf,
}

impl AppContext {
    /// Open the store
    ///
    /// An explicit database path wins over `<root folder>/mondojazz.db`.
    pub async fn open(
        config: TomlConfig,
        config_path: PathBuf,
        root_folder: Option<&Path>,
        database: Option<&Path>,
    ) -> Result<Self> {
        let root_folder = resolve_root_folder(root_folder, &config);
        let db_path = database
            .map(Path::to_path_buf)
            .unwrap_or_else(|| database_path(&root_folder));

        info!("Root folder: {}", root_folder.display());
        let db = init_database(&db_path).await?;

        Ok(Self {
            db,
            config,
            config_path,
        })
    }

    /// Context over an already open pool
    pub fn with_pool(db: SqlitePool, config: TomlConfig) -> Self {
        Self {
            db,
            config,
            config_path: PathBuf::new(),
        }
    }

    pub fn archive(&self) -> Result<HttpArchive> {
        HttpArchive::new(self.config.archive.clone()).map_err(|e| Error::Archive(e.to_string()))
    }

    /// Catalog client with resolved credentials
    pub async fn catalog(&self) -> Result<CatalogClient> {
        let credentials = resolve_catalog_credentials(&self.db, &self.config).await?;
        CatalogClient::new(credentials, &self.config.catalog).map_err(|e| Error::Catalog(e.to_string()))
    }

    /// Persist a refresh token the catalog rotated during this run
    pub async fn release_catalog(&self, client: &CatalogClient) -> Result<()> {
        if let Some(token) = client.rotated_refresh_token().await {
            settings::set_catalog_refresh_token(&self.db, token).await?;
            info!("Stored rotated catalog refresh token");
        }
        Ok(())
    }

    pub async fn close(self) {
        self.db.close().await;
    }
}
