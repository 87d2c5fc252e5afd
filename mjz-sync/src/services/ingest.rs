//! Archive ingest
//!
//! Items pulled from the archive walk are written one by one, each under its
//! own savepoint inside the caller's session transaction. A duplicate is
//! skipped without disturbing the rest of the batch. A failed fetch ends the
//! walk. A show-page walk or spin refresh keeps whatever was written before
//! it. An incremental walk rolls back the whole run, so its stop point never
//! moves past a playlist that was not stored.

use super::walker::{walk_playlists, with_spins, StopCondition};
use crate::archive::{ArchiveError, ArchiveSource, RawItem};
use crate::db::{playlists, spins};
use futures::{Stream, StreamExt, TryStreamExt};
use mjz_common::{Error, Result};
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};

/// Outcome of one ingest batch
#[derive(Debug, Default)]
pub struct IngestReport {
    pub playlists: usize,
    pub spins: usize,
    /// Items already in the store
    pub duplicates: usize,
    /// Items the store rejected for another reason
    pub failed: usize,
    /// Fetch failure that ended the walk early
    pub fetch_error: Option<ArchiveError>,
}

impl IngestReport {
    /// Items newly written
    pub fn written(&self) -> usize {
        self.playlists + self.spins
    }

    fn discard_writes(&mut self) {
        self.playlists = 0;
        self.spins = 0;
    }

    fn absorb(&mut self, other: IngestReport) {
        self.playlists += other.playlists;
        self.spins += other.spins;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
        if self.fetch_error.is_none() {
            self.fetch_error = other.fetch_error;
        }
    }
}

async fn write_item(conn: &mut SqliteConnection, item: &RawItem) -> Result<()> {
    match item {
        RawItem::Playlist(playlist) => {
            playlists::insert_playlist(conn, playlist).await?;
        }
        RawItem::Spin {
            playlist_external_id,
            position,
            spin,
        } => {
            let playlist_id = playlists::find_playlist_id(conn, *playlist_external_id)
                .await?
                .ok_or_else(|| {
                    Error::NotFound(format!("broadcast playlist {}", playlist_external_id))
                })?;
            spins::insert_spin(conn, playlist_id, *position, spin).await?;
        }
    }

    Ok(())
}

/// Write every item of `items` under its own savepoint
///
/// Only a failure of the session itself (opening or closing a savepoint) is
/// returned as an error; per-item outcomes are counted in the report.
pub async fn write_batch<S>(conn: &mut SqliteConnection, items: S) -> Result<IngestReport>
where
    S: Stream<Item = std::result::Result<RawItem, ArchiveError>>,
{
    futures::pin_mut!(items);
    let mut report = IngestReport::default();

    while let Some(item) = items.next().await {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                error!(error = %e, "Archive fetch failed, ending walk");
                report.fetch_error = Some(e);
                break;
            }
        };

        let mut savepoint = conn.begin().await?;
        match write_item(&mut savepoint, &item).await {
            Ok(()) => {
                savepoint.commit().await?;
                debug!(item = %item, "Stored");
                match item {
                    RawItem::Playlist(_) => report.playlists += 1,
                    RawItem::Spin { .. } => report.spins += 1,
                }
            }
            Err(e) if e.is_unique_violation() => {
                savepoint.rollback().await?;
                warn!(item = %item, "Already stored, skipping");
                report.duplicates += 1;
            }
            Err(e) => {
                savepoint.rollback().await?;
                error!(item = %item, error = %e, "Failed to store item");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Run one batch in its own session transaction, committing what was written
async fn ingest_stream<S>(pool: &SqlitePool, items: S) -> Result<IngestReport>
where
    S: Stream<Item = std::result::Result<RawItem, ArchiveError>>,
{
    let mut tx = pool.begin().await?;
    let report = write_batch(&mut tx, items).await?;
    tx.commit().await?;

    info!(
        playlists = report.playlists,
        spins = report.spins,
        duplicates = report.duplicates,
        failed = report.failed,
        "Ingest batch committed"
    );

    Ok(report)
}

/// Walk show pages from `start_page` up to `last_page`, storing playlists
///
/// Spins are fetched separately by `ingest_spins`.
pub async fn ingest_show_pages<A>(
    pool: &SqlitePool,
    source: &A,
    start_page: Option<u32>,
    last_page: Option<u32>,
) -> Result<IngestReport>
where
    A: ArchiveSource + ?Sized,
{
    let stop = last_page.map_or(StopCondition::Exhausted, StopCondition::LastPage);
    let items = walk_playlists(source, start_page, stop).map_ok(RawItem::Playlist);

    ingest_stream(pool, items).await
}

/// Re-fetch spins of every stored playlist whose spin count differs from
/// the archive's
///
/// Playlists whose count already matches are left alone. A playlist whose
/// spins cannot be fetched is logged and skipped.
pub async fn ingest_spins<A>(pool: &SqlitePool, source: &A) -> Result<IngestReport>
where
    A: ArchiveSource + ?Sized,
{
    let mut tx = pool.begin().await?;
    let stored = playlists::playlists_with_spin_counts(&mut tx).await?;
    let mut report = IngestReport::default();

    for (playlist, count) in stored {
        let fetched = match source.playlist_spins(playlist.external_id).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(external_id = playlist.external_id, error = %e, "Failed to fetch spins");
                report.failed += 1;
                continue;
            }
        };

        if fetched.len() as i64 == count {
            debug!(external_id = playlist.external_id, count, "Spins up to date");
            continue;
        }

        info!(
            external_id = playlist.external_id,
            stored = count,
            archived = fetched.len(),
            "Storing missing spins"
        );

        let items = RawItem::spins_of(playlist.external_id, fetched);
        let batch = write_batch(&mut tx, futures::stream::iter(items.into_iter().map(Ok))).await?;
        report.absorb(batch);
    }

    tx.commit().await?;
    Ok(report)
}

/// Store playlists aired since the newest stored one, each with its spins
///
/// An empty store degrades to a full walk. The run is all or nothing: a
/// fetch failure rolls back everything it wrote, so the next run starts
/// from the same stop point.
pub async fn ingest_latest<A>(pool: &SqlitePool, source: &A) -> Result<IngestReport>
where
    A: ArchiveSource + ?Sized,
{
    let latest = {
        let mut conn = pool.acquire().await?;
        playlists::latest_playlist(&mut conn).await?
    };

    let stop = match latest {
        Some(latest) => {
            info!(
                external_id = latest.external_id,
                timeslot = %latest.timeslot,
                "Ingesting playlists newer than latest stored"
            );
            StopCondition::KnownLatest {
                external_id: latest.external_id,
                timeslot: latest.timeslot,
            }
        }
        None => {
            info!("Store is empty, walking the whole archive");
            StopCondition::Exhausted
        }
    };

    let items = with_spins(source, walk_playlists(source, None, stop));

    let mut tx = pool.begin().await?;
    let mut report = write_batch(&mut tx, items).await?;

    if let Some(e) = &report.fetch_error {
        warn!(
            error = %e,
            discarded = report.written(),
            "Incremental ingest interrupted, discarding this run"
        );
        tx.rollback().await?;
        report.discard_writes();
        return Ok(report);
    }

    tx.commit().await?;
    info!(
        playlists = report.playlists,
        spins = report.spins,
        duplicates = report.duplicates,
        failed = report.failed,
        "Incremental ingest committed"
    );

    Ok(report)
}

/// Turn a fetch failure recorded in a report into an error for the caller
pub fn into_result(report: IngestReport) -> Result<IngestReport> {
    match &report.fetch_error {
        Some(e) => Err(Error::Archive(format!(
            "{} (after storing {} items)",
            e,
            report.written()
        ))),
        None => Ok(report),
    }
}
