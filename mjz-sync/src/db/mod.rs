//! Database row operations
//!
//! Functions taking `&mut SqliteConnection` run inside whatever transaction
//! or savepoint the caller holds; they never begin or commit on their own.

pub mod episodes;
pub mod external_playlists;
pub mod playlists;
pub mod settings;
pub mod songs;
pub mod spins;
