//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a single TOML file. Every section is
//! optional; a missing file means "all defaults".

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "MJZ_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "mondojazz.db";

const APP_DIR: &str = "mondojazz";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    pub root_folder: Option<PathBuf>,

    pub logging: LoggingConfig,

    pub archive: ArchiveConfig,

    pub catalog: CatalogConfig,

    pub series: SeriesConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Playlist archive locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Paginated show page listing every broadcast playlist
    pub show_url: String,

    /// Playlist page URL; `{}` is replaced by the playlist's archive id
    pub playlist_url_template: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            show_url: "https://spinitron.com/RFB/show/103797/Mondo-Jazz".to_string(),
            playlist_url_template: "https://spinitron.com/RFB/pl/{}/Mondo-Jazz".to_string(),
        }
    }
}

impl ArchiveConfig {
    /// Playlist page URL for one archive id
    pub fn playlist_url(&self, external_id: i64) -> String {
        self.playlist_url_template.replace("{}", &external_id.to_string())
    }
}

/// Music catalog credentials and client behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,

    /// Redirect URI registered for the authorization code flow
    pub redirect_uri: String,

    /// Minimum spacing between two catalog requests
    pub min_request_interval_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            redirect_uri: "http://127.0.0.1:3000/callback".to_string(),
            min_request_interval_ms: 100,
        }
    }
}

/// Naming of the synthesized playlists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Series label, followed by the episode number in playlist names
    pub label: String,

    /// Appended to the air dates in playlist descriptions
    pub attribution: String,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            label: "Mondo Jazz".to_string(),
            attribution: "on Radio Free Brooklyn with Ludovico Granvassu".to_string(),
        }
    }
}

/// Load the TOML configuration
///
/// A missing file is not an error: defaults are returned and a warning logged.
/// A file that exists but does not parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write the TOML configuration, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    // Replace via rename
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Default configuration file path for the platform
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("./config.toml"))
}

/// Root folder resolution, in priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./mondojazz_data"))
}

/// Database path within a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}
