//! Music catalog collaborator
//!
//! Two capabilities are consumed: track search (resolution) and playlist
//! hosting (synthesis). `CatalogClient` provides both against the live API.

pub mod auth;
pub mod client;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub use client::CatalogClient;

/// Catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog rejected the request as malformed (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Credentials were rejected even after a token refresh
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authorization error: {0}")]
    Auth(String),
}

/// Ordered search constraints
///
/// The empty key carries free text; other keys become `key:value` filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub terms: Vec<(String, String)>,
}

impl SearchQuery {
    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            terms: vec![(String::new(), text.into())],
        }
    }

    pub fn with_filter(mut self, key: &str, value: impl Into<String>) -> Self {
        self.terms.push((key.to_string(), value.into()));
        self
    }

    /// Query string as submitted to the catalog
    pub fn render(&self) -> String {
        self.terms
            .iter()
            .map(|(key, value)| {
                if key.is_empty() {
                    value.clone()
                } else {
                    format!("{}:{}", key, value)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub catalog_id: String,
    pub title: String,
    pub album: Option<String>,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    pub release_date: Option<String>,
    pub artists: Vec<String>,
}

impl CatalogTrack {
    /// Year taken from the first four characters of the release date
    pub fn release_year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|date| date.get(..4))
            .and_then(|year| year.parse().ok())
            .filter(|year| *year > 0)
    }
}

/// Track search, consumed by spin resolution
#[async_trait]
pub trait TrackSearch: Send + Sync {
    /// Candidates for a query, best match first
    async fn search_track(&self, query: &SearchQuery) -> Result<Vec<CatalogTrack>, CatalogError>;
}

/// Playlist hosting, consumed by playlist synthesis
#[async_trait]
pub trait PlaylistHost: Send + Sync {
    /// Create an empty playlist, returning its catalog id
    async fn create_playlist(&self, name: &str, description: &str) -> Result<String, CatalogError>;

    /// Append tracks in order, returning the playlist's new snapshot id
    async fn add_tracks(&self, playlist_id: &str, catalog_ids: &[String]) -> Result<String, CatalogError>;

    /// Make the playlist hold exactly these tracks, in order
    async fn replace_tracks(
        &self,
        playlist_id: &str,
        catalog_ids: &[String],
    ) -> Result<String, CatalogError>;
}
