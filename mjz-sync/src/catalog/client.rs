//! Catalog API client
//!
//! Every request waits on the rate limiter and carries the current access
//! token. A 401 triggers one token refresh and one retry; a second 401 is
//! reported as `Unauthorized`.

use super::auth::{CatalogCredentials, TokenManager, TOKEN_URL};
use super::{CatalogError, CatalogTrack, PlaylistHost, SearchQuery, TrackSearch};
use crate::rate_limit::RateLimiter;
use async_trait::async_trait;
use mjz_common::config::CatalogConfig;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const USER_AGENT: &str = concat!("mjz-sync/", env!("CARGO_PKG_VERSION"));
const MAX_TRACKS_PER_REQUEST: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Paging<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<Option<T>>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    id: Option<String>,
    name: String,
    album: Option<AlbumObject>,
    #[serde(default)]
    artists: Vec<ArtistObject>,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    name: String,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    snapshot_id: String,
}

impl TrackObject {
    fn into_track(self) -> Option<CatalogTrack> {
        let catalog_id = self.id?;
        let (album, release_date) = match self.album {
            Some(album) => (Some(album.name), album.release_date),
            None => (None, None),
        };

        Some(CatalogTrack {
            catalog_id,
            title: self.name,
            album,
            release_date,
            artists: self.artists.into_iter().map(|a| a.name).collect(),
        })
    }
}

/// Catalog API client
pub struct CatalogClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
    tokens: TokenManager,
    api_base: String,
    user_id: Mutex<Option<String>>,
}

impl CatalogClient {
    pub fn new(credentials: CatalogCredentials, config: &CatalogConfig) -> Result<Self, CatalogError> {
        Self::with_endpoints(credentials, config, API_BASE_URL, TOKEN_URL)
    }

    /// Client against explicit API and token endpoints
    pub fn with_endpoints(
        credentials: CatalogCredentials,
        config: &CatalogConfig,
        api_base: &str,
        token_url: &str,
    ) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Ok(Self {
            tokens: TokenManager::new(http_client.clone(), token_url.to_string(), credentials),
            http_client,
            rate_limiter: RateLimiter::new(config.min_request_interval_ms),
            api_base: api_base.trim_end_matches('/').to_string(),
            user_id: Mutex::new(None),
        })
    }

    /// Refresh token issued during this session, to be persisted by the caller
    pub async fn rotated_refresh_token(&self) -> Option<String> {
        self.tokens.rotated_refresh_token().await
    }

    /// Send a request built by `build` for a given access token
    ///
    /// On 401 the token is refreshed once and the request rebuilt and resent.
    async fn send_authorized<F>(&self, build: F) -> Result<Response, CatalogError>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        self.rate_limiter.wait().await;
        let token = self.tokens.access_token().await?;
        let response = build(&token)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        debug!("Access token rejected, refreshing");
        let token = self.tokens.refresh().await?;

        self.rate_limiter.wait().await;
        let response = build(&token)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        check_status(response).await
    }

    /// Id of the user owning the refresh token, fetched once
    async fn current_user_id(&self) -> Result<String, CatalogError> {
        let mut user_id = self.user_id.lock().await;
        if let Some(id) = user_id.as_ref() {
            return Ok(id.clone());
        }

        let url = format!("{}/me", self.api_base);
        let profile: UserProfile = self
            .send_authorized(|token| self.http_client.get(&url).bearer_auth(token))
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        debug!(user_id = %profile.id, "Resolved catalog user");
        *user_id = Some(profile.id.clone());
        Ok(profile.id)
    }
}

async fn check_status(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::BAD_REQUEST => Err(CatalogError::BadRequest(body)),
        StatusCode::UNAUTHORIZED => Err(CatalogError::Unauthorized),
        _ => Err(CatalogError::Api(status.as_u16(), body)),
    }
}

fn track_uri(catalog_id: &str) -> String {
    format!("spotify:track:{}", catalog_id)
}

#[async_trait]
impl TrackSearch for CatalogClient {
    async fn search_track(&self, query: &SearchQuery) -> Result<Vec<CatalogTrack>, CatalogError> {
        let url = format!("{}/search", self.api_base);
        let q = query.render();

        debug!(query = %q, "Searching catalog");

        let response: SearchResponse = self
            .send_authorized(|token| {
                self.http_client
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("q", q.as_str()), ("type", "track")])
            })
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        Ok(response
            .tracks
            .items
            .into_iter()
            .flatten()
            .filter_map(TrackObject::into_track)
            .collect())
    }
}

#[async_trait]
impl PlaylistHost for CatalogClient {
    async fn create_playlist(&self, name: &str, description: &str) -> Result<String, CatalogError> {
        let user_id = self.current_user_id().await?;
        let url = format!("{}/users/{}/playlists", self.api_base, user_id);
        let body = json!({
            "name": name,
            "description": description,
            "public": true,
        });

        let playlist: PlaylistObject = self
            .send_authorized(|token| self.http_client.post(&url).bearer_auth(token).json(&body))
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        info!(playlist_id = %playlist.id, name = %name, "Created catalog playlist");
        Ok(playlist.id)
    }

    async fn add_tracks(&self, playlist_id: &str, catalog_ids: &[String]) -> Result<String, CatalogError> {
        if catalog_ids.is_empty() {
            warn!(playlist_id = %playlist_id, "No tracks to add");
            return Ok(String::new());
        }

        let mut snapshot_id = String::new();
        for chunk in catalog_ids.chunks(MAX_TRACKS_PER_REQUEST) {
            snapshot_id = self.send_tracks(reqwest::Method::POST, playlist_id, chunk).await?;
        }

        info!(
            playlist_id = %playlist_id,
            tracks = catalog_ids.len(),
            snapshot_id = %snapshot_id,
            "Added tracks to catalog playlist"
        );

        Ok(snapshot_id)
    }

    async fn replace_tracks(
        &self,
        playlist_id: &str,
        catalog_ids: &[String],
    ) -> Result<String, CatalogError> {
        // PUT takes at most one chunk; the rest is appended
        let mut chunks = catalog_ids.chunks(MAX_TRACKS_PER_REQUEST);
        let first = chunks.next().unwrap_or(&[]);
        let mut snapshot_id = self.send_tracks(reqwest::Method::PUT, playlist_id, first).await?;

        for chunk in chunks {
            snapshot_id = self.send_tracks(reqwest::Method::POST, playlist_id, chunk).await?;
        }

        info!(
            playlist_id = %playlist_id,
            tracks = catalog_ids.len(),
            snapshot_id = %snapshot_id,
            "Replaced tracks of catalog playlist"
        );

        Ok(snapshot_id)
    }
}

impl CatalogClient {
    /// One request against a playlist's track list, returning the snapshot id
    async fn send_tracks(
        &self,
        method: reqwest::Method,
        playlist_id: &str,
        catalog_ids: &[String],
    ) -> Result<String, CatalogError> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        let body = json!({
            "uris": catalog_ids.iter().map(|id| track_uri(id)).collect::<Vec<_>>(),
        });

        let snapshot: SnapshotResponse = self
            .send_authorized(|token| {
                self.http_client
                    .request(method.clone(), &url)
                    .bearer_auth(token)
                    .json(&body)
            })
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        Ok(snapshot.snapshot_id)
    }
}
