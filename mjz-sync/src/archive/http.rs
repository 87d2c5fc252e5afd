//! Archive client over HTTP

use super::extract::{parse_playlist_page, parse_show_page};
use super::{ArchiveError, ArchiveSource, RawSpin, ShowPage};
use crate::rate_limit::RateLimiter;
use async_trait::async_trait;
use mjz_common::config::ArchiveConfig;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("mjz-sync/", env!("CARGO_PKG_VERSION"));
const RATE_LIMIT_MS: u64 = 500;

/// Reads show and playlist pages from the public archive site
pub struct HttpArchive {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
    config: ArchiveConfig,
}

impl HttpArchive {
    pub fn new(config: ArchiveConfig) -> Result<Self, ArchiveError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ArchiveError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
            config,
        })
    }

    async fn fetch(&self, url: &str, page: Option<u32>) -> Result<String, ArchiveError> {
        self.rate_limiter.wait().await;

        debug!(url = %url, ?page, "Fetching archive page");

        let mut request = self.http_client.get(url);
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ArchiveError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::Status(status.as_u16(), url.to_string()));
        }

        response
            .text()
            .await
            .map_err(|e| ArchiveError::Network(e.to_string()))
    }
}

#[async_trait]
impl ArchiveSource for HttpArchive {
    async fn show_page(&self, page: Option<u32>) -> Result<ShowPage, ArchiveError> {
        let markup = self.fetch(&self.config.show_url, page).await?;
        parse_show_page(&markup)
    }

    async fn playlist_spins(&self, external_id: i64) -> Result<Vec<RawSpin>, ArchiveError> {
        let url = self.config.playlist_url(external_id);
        let markup = self.fetch(&url, None).await?;
        let spins = parse_playlist_page(&markup)?;

        debug!(external_id, spins = spins.len(), "Parsed playlist page");
        Ok(spins)
    }
}
