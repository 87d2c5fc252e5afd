//! Playlist synthesis
//!
//! Publishes one catalog playlist per episode from the spins of its first
//! airing. The playlist is created in the catalog first and recorded locally
//! right after; the track list is submitted last. A playlist whose tracks
//! were not accepted stays unsynced and is retried by `resync_unsynced`,
//! which replaces the catalog's track list rather than appending to it.

use super::naming::{episode_description, episode_name, track_list};
use crate::catalog::PlaylistHost;
use crate::db::{episodes, external_playlists, playlists, spins};
use mjz_common::config::SeriesConfig;
use mjz_common::db::{Episode, ExternalPlaylist, Spin};
use mjz_common::Result;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};

/// Outcome of synthesizing one episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// Created in the catalog and recorded; `synced` tells whether the
    /// track list was accepted too
    Created {
        playlist: ExternalPlaylist,
        synced: bool,
    },
    /// The episode already has a playlist; nothing was done
    AlreadyExists { external_id: String },
    /// The episode has no airings to take tracks from
    NoAirings,
    /// Some tracks of the first airing are still unresolved
    Incomplete { unresolved: usize },
    /// The catalog refused to create the playlist; nothing was recorded
    Deferred,
}

/// Counts from synthesizing every pending episode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    pub created: usize,
    /// Created but the track list still needs a resync
    pub unsynced: usize,
    pub incomplete: usize,
    pub deferred: usize,
    pub failed: usize,
}

/// Synthesizes episode playlists on a playlist host
pub struct PlaylistSynthesizer<'a, P: PlaylistHost + ?Sized> {
    host: &'a P,
    series: &'a SeriesConfig,
}

impl<'a, P: PlaylistHost + ?Sized> PlaylistSynthesizer<'a, P> {
    pub fn new(host: &'a P, series: &'a SeriesConfig) -> Self {
        Self { host, series }
    }

    /// Synthesize the playlist of one episode
    ///
    /// Calling this again for an episode that has a playlist is a no-op.
    pub async fn synthesize(&self, pool: &SqlitePool, episode: &Episode) -> Result<SynthesisOutcome> {
        let mut tx = pool.begin().await?;

        if let Some(existing) = external_playlists::find_by_episode(&mut tx, episode.id).await? {
            warn!(
                number = episode.number,
                external_id = %existing.external_id,
                "Episode already has a playlist"
            );
            return Ok(SynthesisOutcome::AlreadyExists {
                external_id: existing.external_id,
            });
        }

        let airings = playlists::playlists_for_episode(&mut tx, episode.id).await?;
        let Some(first) = airings.first() else {
            warn!(number = episode.number, "Episode has no airings");
            return Ok(SynthesisOutcome::NoAirings);
        };

        let first_spins = spins::spins_for_playlist(&mut tx, first.id).await?;
        let tracks = track_list(&first_spins);

        let unresolved = tracks.iter().filter(|spin| spin.song_id.is_none()).count();
        if unresolved > 0 {
            info!(
                number = episode.number,
                unresolved,
                "Episode has unresolved spins, not synthesizing yet"
            );
            return Ok(SynthesisOutcome::Incomplete { unresolved });
        }

        let name = episode_name(self.series, episode.number, &airings);
        let description = episode_description(self.series, &airings);

        let external_id = match self.host.create_playlist(&name, &description).await {
            Ok(id) => id,
            Err(e) => {
                error!(number = episode.number, error = %e, "Failed to create catalog playlist");
                return Ok(SynthesisOutcome::Deferred);
            }
        };

        let mut playlist = match self
            .record(&mut tx, &external_id, episode, &name, &description, &tracks)
            .await
        {
            Ok(playlist) => playlist,
            Err(e) => {
                error!(
                    number = episode.number,
                    external_id = %external_id,
                    error = %e,
                    "Catalog playlist created but not recorded"
                );
                return Err(e);
            }
        };
        tx.commit().await?;

        info!(
            number = episode.number,
            external_id = %external_id,
            name = %name,
            tracks = tracks.len(),
            "Recorded episode playlist"
        );

        let synced = self.submit_tracks(pool, &mut playlist, false).await?;
        Ok(SynthesisOutcome::Created { playlist, synced })
    }

    async fn record(
        &self,
        conn: &mut SqliteConnection,
        external_id: &str,
        episode: &Episode,
        name: &str,
        description: &str,
        tracks: &[&Spin],
    ) -> Result<ExternalPlaylist> {
        let playlist =
            external_playlists::insert_external_playlist(conn, external_id, episode.id, name, description)
                .await?;

        for (position, spin) in tracks.iter().enumerate() {
            if let Some(song_id) = spin.song_id {
                external_playlists::insert_item(conn, playlist.id, position as i64, song_id).await?;
            }
        }

        Ok(playlist)
    }

    /// Submit a recorded playlist's tracks to the catalog
    ///
    /// Placeholder songs have no catalog id and are left out. With `replace`
    /// the catalog's current track list is overwritten instead of appended
    /// to. Returns whether the catalog accepted the list; a refusal is
    /// logged, not returned.
    async fn submit_tracks(
        &self,
        pool: &SqlitePool,
        playlist: &mut ExternalPlaylist,
        replace: bool,
    ) -> Result<bool> {
        let items = {
            let mut conn = pool.acquire().await?;
            external_playlists::item_catalog_ids(&mut conn, playlist.id).await?
        };

        let total = items.len();
        let catalog_ids: Vec<String> = items.into_iter().filter_map(|(_, id)| id).collect();
        if catalog_ids.len() < total {
            warn!(
                external_id = %playlist.external_id,
                placeholders = total - catalog_ids.len(),
                "Leaving unmatched tracks out of catalog playlist"
            );
        }

        let submitted = if replace {
            self.host.replace_tracks(&playlist.external_id, &catalog_ids).await
        } else {
            self.host.add_tracks(&playlist.external_id, &catalog_ids).await
        };

        match submitted {
            Ok(snapshot_id) => {
                let mut conn = pool.acquire().await?;
                playlist.synced_at = Some(external_playlists::mark_synced(&mut conn, playlist.id).await?);
                debug!(external_id = %playlist.external_id, snapshot_id = %snapshot_id, "Playlist synced");
                Ok(true)
            }
            Err(e) => {
                error!(
                    external_id = %playlist.external_id,
                    error = %e,
                    "Catalog playlist created but tracks not added; run resync"
                );
                Ok(false)
            }
        }
    }

    /// Synthesize every episode without a playlist, lowest number first
    pub async fn synthesize_all(&self, pool: &SqlitePool) -> Result<SynthesisReport> {
        let pending = {
            let mut conn = pool.acquire().await?;
            episodes::episodes_without_external_playlist(&mut conn).await?
        };

        info!(episodes = pending.len(), "Synthesizing episode playlists");

        let mut report = SynthesisReport::default();
        for episode in &pending {
            match self.synthesize(pool, episode).await {
                Ok(SynthesisOutcome::Created { synced, .. }) => {
                    report.created += 1;
                    if !synced {
                        report.unsynced += 1;
                    }
                }
                Ok(SynthesisOutcome::Incomplete { .. }) | Ok(SynthesisOutcome::NoAirings) => {
                    report.incomplete += 1
                }
                Ok(SynthesisOutcome::Deferred) => report.deferred += 1,
                Ok(SynthesisOutcome::AlreadyExists { .. }) => {}
                Err(e) => {
                    error!(number = episode.number, error = %e, "Failed to synthesize episode");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Retry track submission for every playlist never synced
    ///
    /// Returns the number of playlists synced by this call.
    pub async fn resync_unsynced(&self, pool: &SqlitePool) -> Result<usize> {
        let unsynced = {
            let mut conn = pool.acquire().await?;
            external_playlists::unsynced_playlists(&mut conn).await?
        };

        let mut synced = 0;
        for mut playlist in unsynced {
            info!(external_id = %playlist.external_id, name = %playlist.name, "Resyncing playlist");
            if self.submit_tracks(pool, &mut playlist, true).await? {
                synced += 1;
            }
        }

        Ok(synced)
    }
}
