//! Record model rows
//!
//! Plain row shapes for every persisted entity. Behavior lives with the
//! operations that read and write them, and derived display values (episode
//! names, air dates) are computed by free functions elsewhere.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Settings key/value pair
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: Option<String>,
}

/// One on-air segment scraped from the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BroadcastPlaylist {
    pub id: i64,
    /// Archive id, globally unique
    pub external_id: i64,
    /// Scheduled start, globally unique
    pub timeslot: NaiveDateTime,
    pub title: String,
    pub description: Option<String>,
    pub episode_id: Option<i64>,
}

/// One played track within a broadcast playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Spin {
    pub id: i64,
    /// Archive id, globally unique
    pub external_id: i64,
    pub playlist_id: i64,
    /// Ordinal position within the playlist (0 = first track aired)
    pub position: i64,
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub start_time: NaiveTime,
    /// Null until resolved
    pub song_id: Option<i64>,
}

/// Canonical catalog identity
///
/// A song without `catalog_id` is a placeholder for a spin that matched
/// nothing in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Song {
    pub id: i64,
    pub catalog_id: Option<String>,
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub year: Option<i32>,
}

impl Song {
    pub fn is_placeholder(&self) -> bool {
        self.catalog_id.is_none()
    }
}

/// Logical on-air numbering unit grouping re-airings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Episode {
    pub id: i64,
    pub number: i64,
}

/// Synthesized, externally hosted playlist for one episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExternalPlaylist {
    pub id: i64,
    pub external_id: String,
    pub episode_id: i64,
    pub name: String,
    pub description: String,
    /// Set once the full track list was accepted by the catalog
    pub synced_at: Option<NaiveDateTime>,
}

/// One track placed into an external playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlaylistItem {
    pub id: i64,
    pub playlist_id: i64,
    /// Emission order, unique within the playlist
    pub position: i64,
    pub song_id: i64,
}
