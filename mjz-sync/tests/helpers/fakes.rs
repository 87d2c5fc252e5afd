//! In-memory collaborators
//!
//! `FakeArchive` serves show pages and playlist spins from vectors and counts
//! fetches. `FakeCatalog` answers searches from a table keyed by rendered
//! query and records every playlist call.

use async_trait::async_trait;
use mjz_sync::archive::{ArchiveError, ArchiveSource, RawPlaylist, RawSpin, ShowPage};
use mjz_sync::catalog::{CatalogError, CatalogTrack, PlaylistHost, SearchQuery, TrackSearch};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Archive with fixed pages, page 1 first
#[derive(Default)]
pub struct FakeArchive {
    pages: Vec<Vec<RawPlaylist>>,
    spins: HashMap<i64, Vec<RawSpin>>,
    failing_pages: HashSet<u32>,
    failing_playlists: HashSet<i64>,
    pub page_fetches: AtomicUsize,
    pub spin_fetches: AtomicUsize,
}

impl FakeArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, playlists: Vec<RawPlaylist>) -> Self {
        self.pages.push(playlists);
        self
    }

    pub fn with_spins(mut self, external_id: i64, spins: Vec<RawSpin>) -> Self {
        self.spins.insert(external_id, spins);
        self
    }

    pub fn failing_page(mut self, page: u32) -> Self {
        self.failing_pages.insert(page);
        self
    }

    pub fn failing_playlist(mut self, external_id: i64) -> Self {
        self.failing_playlists.insert(external_id);
        self
    }

    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }

    pub fn spin_fetches(&self) -> usize {
        self.spin_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveSource for FakeArchive {
    async fn show_page(&self, page: Option<u32>) -> Result<ShowPage, ArchiveError> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        let page = page.unwrap_or(1);

        if self.failing_pages.contains(&page) {
            return Err(ArchiveError::Status(503, format!("page {}", page)));
        }

        let items = self
            .pages
            .get(page as usize - 1)
            .cloned()
            .ok_or_else(|| ArchiveError::Status(404, format!("page {}", page)))?;

        Ok(ShowPage {
            items,
            next_page: ((page as usize) < self.pages.len()).then_some(page + 1),
        })
    }

    async fn playlist_spins(&self, external_id: i64) -> Result<Vec<RawSpin>, ArchiveError> {
        self.spin_fetches.fetch_add(1, Ordering::SeqCst);

        if self.failing_playlists.contains(&external_id) {
            return Err(ArchiveError::Network("connection reset".to_string()));
        }

        Ok(self.spins.get(&external_id).cloned().unwrap_or_default())
    }
}

/// Canned answer for one rendered query
#[derive(Debug, Clone)]
pub enum SearchBehavior {
    Results(Vec<CatalogTrack>),
    BadRequest,
    Unavailable,
}

/// Catalog fake for both search and playlist hosting
#[derive(Default)]
pub struct FakeCatalog {
    answers: Mutex<HashMap<String, SearchBehavior>>,
    default_answer: Mutex<Option<SearchBehavior>>,
    pub searches: Mutex<Vec<String>>,
    pub created: Mutex<Vec<(String, String)>>,
    pub added: Mutex<Vec<(String, Vec<String>)>>,
    pub replaced: Mutex<Vec<(String, Vec<String>)>>,
    contents: Mutex<HashMap<String, Vec<String>>>,
    pub fail_create: AtomicBool,
    /// Fail track submissions, adds and replacements alike
    pub fail_add: AtomicBool,
    /// Keep the added tracks but report a failure, like a later chunk failing
    pub fail_after_add: AtomicBool,
    cancel_on_search: Mutex<Option<CancellationToken>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` (rendered form) with `behavior`
    pub fn answer(&self, query: &str, behavior: SearchBehavior) {
        self.answers
            .lock()
            .unwrap()
            .insert(query.to_string(), behavior);
    }

    /// Answer every query without its own entry with `behavior`
    pub fn answer_all(&self, behavior: SearchBehavior) {
        *self.default_answer.lock().unwrap() = Some(behavior);
    }

    /// Cancel `token` as soon as the first search arrives
    pub fn cancel_on_search(&self, token: CancellationToken) {
        *self.cancel_on_search.lock().unwrap() = Some(token);
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<(String, String)> {
        self.created.lock().unwrap().clone()
    }

    pub fn added(&self) -> Vec<(String, Vec<String>)> {
        self.added.lock().unwrap().clone()
    }

    pub fn replaced(&self) -> Vec<(String, Vec<String>)> {
        self.replaced.lock().unwrap().clone()
    }

    /// Tracks a playlist currently holds
    pub fn tracks_of(&self, playlist_id: &str) -> Vec<String> {
        self.contents
            .lock()
            .unwrap()
            .get(playlist_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TrackSearch for FakeCatalog {
    async fn search_track(&self, query: &SearchQuery) -> Result<Vec<CatalogTrack>, CatalogError> {
        let rendered = query.render();
        self.searches.lock().unwrap().push(rendered.clone());

        if let Some(token) = self.cancel_on_search.lock().unwrap().as_ref() {
            token.cancel();
        }

        let behavior = self
            .answers
            .lock()
            .unwrap()
            .get(&rendered)
            .cloned()
            .or_else(|| self.default_answer.lock().unwrap().clone())
            .unwrap_or(SearchBehavior::Results(Vec::new()));

        match behavior {
            SearchBehavior::Results(tracks) => Ok(tracks),
            SearchBehavior::BadRequest => Err(CatalogError::BadRequest("malformed query".to_string())),
            SearchBehavior::Unavailable => Err(CatalogError::Api(503, "unavailable".to_string())),
        }
    }
}

#[async_trait]
impl PlaylistHost for FakeCatalog {
    async fn create_playlist(&self, name: &str, description: &str) -> Result<String, CatalogError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CatalogError::Api(500, "create failed".to_string()));
        }

        let mut created = self.created.lock().unwrap();
        created.push((name.to_string(), description.to_string()));
        Ok(format!("playlist-{}", created.len()))
    }

    async fn add_tracks(&self, playlist_id: &str, catalog_ids: &[String]) -> Result<String, CatalogError> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(CatalogError::Network("timed out".to_string()));
        }

        let mut added = self.added.lock().unwrap();
        added.push((playlist_id.to_string(), catalog_ids.to_vec()));
        self.contents
            .lock()
            .unwrap()
            .entry(playlist_id.to_string())
            .or_default()
            .extend(catalog_ids.iter().cloned());

        if self.fail_after_add.load(Ordering::SeqCst) {
            return Err(CatalogError::Api(502, "bad gateway".to_string()));
        }
        Ok(format!("snapshot-{}", added.len()))
    }

    async fn replace_tracks(
        &self,
        playlist_id: &str,
        catalog_ids: &[String],
    ) -> Result<String, CatalogError> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(CatalogError::Network("timed out".to_string()));
        }

        let mut replaced = self.replaced.lock().unwrap();
        replaced.push((playlist_id.to_string(), catalog_ids.to_vec()));
        self.contents
            .lock()
            .unwrap()
            .insert(playlist_id.to_string(), catalog_ids.to_vec());
        Ok(format!("replaced-{}", replaced.len()))
    }
}
