//! Spin resolution
//!
//! Links each spin to a canonical song. A spin whose exact title and artist
//! already belong to a song reuses it without a catalog call. Otherwise the
//! catalog is searched with progressively looser queries; the first result
//! of the first query that returns any wins. Candidates are deduplicated on
//! catalog id, and a spin nothing matches gets its own placeholder song.

use crate::catalog::{CatalogError, CatalogTrack, SearchQuery, TrackSearch};
use crate::db::songs::{self, NewSong};
use crate::db::spins;
use mjz_common::db::Spin;
use mjz_common::Result;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Search strategy, from most to least specific
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStrategy {
    /// Title plus artist, album and year filters where known
    Filtered,
    /// Title, artist, album and year as free text
    FreeText,
    /// Title and artist only
    Minimal,
}

impl QueryStrategy {
    pub fn build(self, spin: &Spin) -> SearchQuery {
        let album = spin.album.as_deref().filter(|a| !a.trim().is_empty());

        match self {
            QueryStrategy::Filtered => {
                let mut query = SearchQuery::free_text(spin.title.clone())
                    .with_filter("artist", spin.artist.clone());
                if let Some(album) = album {
                    query = query.with_filter("album", album);
                }
                if let Some(year) = spin.year {
                    query = query.with_filter("year", year.to_string());
                }
                query
            }
            QueryStrategy::FreeText => {
                let mut parts = vec![spin.title.clone(), spin.artist.clone()];
                parts.extend(album.map(str::to_string));
                parts.extend(spin.year.map(|y| y.to_string()));
                SearchQuery::free_text(parts.join(" "))
            }
            QueryStrategy::Minimal => {
                SearchQuery::free_text(format!("{} {}", spin.title, spin.artist))
            }
        }
    }

    /// Next strategy to try after this one returned nothing
    pub fn looser(self) -> Option<QueryStrategy> {
        match self {
            QueryStrategy::Filtered => Some(QueryStrategy::FreeText),
            QueryStrategy::FreeText => Some(QueryStrategy::Minimal),
            QueryStrategy::Minimal => None,
        }
    }
}

/// How a linked spin found its song
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    AlreadyLinked,
    /// A song with the same title and artist already existed
    KnownTitle,
    /// The catalog match was already recorded as a song
    CatalogDuplicate,
    /// A new song was recorded from the catalog match
    CatalogNew,
}

/// Outcome of resolving one spin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Linked { song_id: i64, via: Resolution },
    /// Nothing matched; linked to a fresh placeholder
    Unmatched { song_id: i64 },
    /// The catalog failed; the spin stays unresolved for a later run
    Deferred,
}

/// Counts from one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub linked: usize,
    pub unmatched: usize,
    pub deferred: usize,
    pub cancelled: bool,
}

/// Resolves spins against a track search
pub struct SpinResolver<'a, S: TrackSearch + ?Sized> {
    search: &'a S,
}

impl<'a, S: TrackSearch + ?Sized> SpinResolver<'a, S> {
    pub fn new(search: &'a S) -> Self {
        Self { search }
    }

    /// Resolve one spin inside the caller's transaction
    ///
    /// A resolved spin is returned as is. Catalog failures come back as
    /// `Deferred` with nothing written.
    pub async fn resolve(&self, conn: &mut SqliteConnection, spin: &Spin) -> Result<ResolveOutcome> {
        if let Some(song_id) = spin.song_id {
            return Ok(ResolveOutcome::Linked {
                song_id,
                via: Resolution::AlreadyLinked,
            });
        }

        if let Some(song) = songs::find_by_title_artist(conn, &spin.title, &spin.artist).await? {
            debug!(spin_id = spin.id, song_id = song.id, "Reusing song with same title and artist");
            spins::link_to_song(conn, spin.id, song.id).await?;
            return Ok(ResolveOutcome::Linked {
                song_id: song.id,
                via: Resolution::KnownTitle,
            });
        }

        let candidate = match self.search_cascade(spin).await {
            Ok(candidate) => candidate,
            Err(e) => {
                error!(
                    spin_id = spin.id,
                    title = %spin.title,
                    artist = %spin.artist,
                    error = %e,
                    "Catalog search failed, deferring spin"
                );
                return Ok(ResolveOutcome::Deferred);
            }
        };

        let Some(track) = candidate else {
            warn!(
                spin_id = spin.id,
                title = %spin.title,
                artist = %spin.artist,
                "No catalog match, recording placeholder"
            );
            let song_id = songs::insert_song(conn, &placeholder(spin)).await?;
            spins::link_to_song(conn, spin.id, song_id).await?;
            return Ok(ResolveOutcome::Unmatched { song_id });
        };

        if let Some(existing) = songs::find_by_catalog_id(conn, &track.catalog_id).await? {
            debug!(
                spin_id = spin.id,
                song_id = existing.id,
                catalog_id = %track.catalog_id,
                "Catalog match already recorded"
            );
            spins::link_to_song(conn, spin.id, existing.id).await?;
            return Ok(ResolveOutcome::Linked {
                song_id: existing.id,
                via: Resolution::CatalogDuplicate,
            });
        }

        let song_id = songs::insert_song(conn, &song_from_match(spin, &track)).await?;
        spins::link_to_song(conn, spin.id, song_id).await?;

        info!(
            spin_id = spin.id,
            song_id,
            catalog_id = %track.catalog_id,
            title = %spin.title,
            artist = %spin.artist,
            "Recorded new song from catalog"
        );

        Ok(ResolveOutcome::Linked {
            song_id,
            via: Resolution::CatalogNew,
        })
    }

    /// First result of the first strategy that returns any
    ///
    /// A query the catalog rejects as malformed skips straight to the minimal
    /// strategy. Any other catalog error aborts the cascade.
    async fn search_cascade(&self, spin: &Spin) -> std::result::Result<Option<CatalogTrack>, CatalogError> {
        let mut next = Some(QueryStrategy::Filtered);

        while let Some(strategy) = next {
            let query = strategy.build(spin);
            debug!(spin_id = spin.id, ?strategy, query = %query, "Searching catalog");

            match self.search.search_track(&query).await {
                Ok(results) => {
                    if let Some(first) = results.into_iter().next() {
                        return Ok(Some(first));
                    }
                    next = strategy.looser();
                }
                Err(CatalogError::BadRequest(message)) if strategy != QueryStrategy::Minimal => {
                    warn!(
                        spin_id = spin.id,
                        query = %query,
                        message = %message,
                        "Catalog rejected query, falling back to minimal query"
                    );
                    next = Some(QueryStrategy::Minimal);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }
}

fn placeholder(spin: &Spin) -> NewSong {
    NewSong {
        catalog_id: None,
        artist: spin.artist.clone(),
        title: spin.title.clone(),
        album: spin.album.clone(),
        year: spin.year,
    }
}

/// Song for a catalog match, keeping the spin's own title and artist
///
/// Album and year come from the spin when it has them, otherwise from the
/// match.
fn song_from_match(spin: &Spin, track: &CatalogTrack) -> NewSong {
    NewSong {
        catalog_id: Some(track.catalog_id.clone()),
        artist: spin.artist.clone(),
        title: spin.title.clone(),
        album: spin
            .album
            .clone()
            .filter(|a| !a.trim().is_empty())
            .or_else(|| track.album.clone()),
        year: spin.year.or_else(|| track.release_year()),
    }
}

/// Resolve every unresolved spin in one session
///
/// Each spin runs under its own savepoint; a deferred or failed spin is
/// rolled back alone. Cancellation is honored between spins, and everything
/// resolved up to that point is committed.
pub async fn resolve_pending<S>(
    pool: &SqlitePool,
    search: &S,
    cancel: &CancellationToken,
) -> Result<ResolveReport>
where
    S: TrackSearch + ?Sized,
{
    let resolver = SpinResolver::new(search);
    let mut report = ResolveReport::default();

    let mut tx = pool.begin().await?;
    let pending = spins::unresolved_spins(&mut tx).await?;
    info!(pending = pending.len(), "Resolving spins");

    for spin in pending {
        if cancel.is_cancelled() {
            info!("Resolution cancelled, committing progress");
            report.cancelled = true;
            break;
        }

        let mut savepoint = Connection::begin(&mut *tx).await?;
        match resolver.resolve(&mut savepoint, &spin).await {
            Ok(ResolveOutcome::Deferred) => {
                savepoint.rollback().await?;
                report.deferred += 1;
            }
            Ok(outcome) => {
                savepoint.commit().await?;
                match outcome {
                    ResolveOutcome::Unmatched { .. } => report.unmatched += 1,
                    _ => report.linked += 1,
                }
            }
            Err(e) => {
                savepoint.rollback().await?;
                error!(spin_id = spin.id, error = %e, "Failed to resolve spin");
                report.deferred += 1;
            }
        }
    }

    tx.commit().await?;

    info!(
        linked = report.linked,
        unmatched = report.unmatched,
        deferred = report.deferred,
        cancelled = report.cancelled,
        "Resolution pass finished"
    );

    Ok(report)
}
