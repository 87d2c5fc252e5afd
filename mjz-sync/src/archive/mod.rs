//! Playlist archive collaborator
//!
//! The archive is the station's public record of what aired: a paginated show
//! page listing broadcast playlists (newest first), and one page per playlist
//! listing its spins in airing order.

pub mod extract;
pub mod http;

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime};
use std::fmt;
use thiserror::Error;

pub use http::HttpArchive;

/// Archive errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Archive returned HTTP {0} for {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// One broadcast playlist as listed on a show page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPlaylist {
    pub external_id: i64,
    pub timeslot: NaiveDateTime,
    pub title: String,
    pub description: Option<String>,
}

/// One spin as listed on a playlist page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSpin {
    pub external_id: i64,
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub start_time: NaiveTime,
}

/// One parsed show page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowPage {
    /// Playlists in page order (newest first)
    pub items: Vec<RawPlaylist>,

    /// Page number to request next, `None` on the last page
    pub next_page: Option<u32>,
}

/// Item flowing from the archive walk into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawItem {
    Playlist(RawPlaylist),
    Spin {
        playlist_external_id: i64,
        position: i64,
        spin: RawSpin,
    },
}

impl RawItem {
    /// Spin items for one playlist, positioned in airing order from 0
    pub fn spins_of(playlist_external_id: i64, spins: Vec<RawSpin>) -> Vec<RawItem> {
        spins
            .into_iter()
            .enumerate()
            .map(|(position, spin)| RawItem::Spin {
                playlist_external_id,
                position: position as i64,
                spin,
            })
            .collect()
    }
}

impl fmt::Display for RawItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawItem::Playlist(p) => write!(f, "playlist {} ({})", p.external_id, p.timeslot),
            RawItem::Spin {
                playlist_external_id,
                position,
                spin,
            } => write!(
                f,
                "spin {} #{} of playlist {} ({} - {})",
                spin.external_id, position, playlist_external_id, spin.artist, spin.title
            ),
        }
    }
}

/// Source of archive pages
///
/// `HttpArchive` reads the live site; tests substitute in-memory fakes.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Fetch one show page. `None` requests the first page.
    async fn show_page(&self, page: Option<u32>) -> Result<ShowPage, ArchiveError>;

    /// Fetch the spins of one playlist in airing order
    async fn playlist_spins(&self, external_id: i64) -> Result<Vec<RawSpin>, ArchiveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spin(external_id: i64) -> RawSpin {
        RawSpin {
            external_id,
            artist: "Artist".to_string(),
            title: format!("Song {}", external_id),
            album: None,
            year: None,
            start_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_spins_of_assigns_positions_in_order() {
        let items = RawItem::spins_of(7, vec![spin(30), spin(10), spin(20)]);

        let positions: Vec<(i64, i64)> = items
            .iter()
            .map(|item| match item {
                RawItem::Spin { position, spin, .. } => (*position, spin.external_id),
                RawItem::Playlist(_) => panic!("unexpected playlist item"),
            })
            .collect();

        assert_eq!(positions, vec![(0, 30), (1, 10), (2, 20)]);
    }

    #[test]
    fn test_display_names_the_item() {
        let item = RawItem::spins_of(7, vec![spin(30)]).remove(0);
        assert_eq!(item.to_string(), "spin 30 #0 of playlist 7 (Artist - Song 30)");
    }
}
