//! Lazy archive walk
//!
//! Show pages are fetched one at a time as the consumer pulls items, so a
//! walk that stops early never touches the pages behind the stop point.

use crate::archive::{ArchiveError, ArchiveSource, RawItem, RawPlaylist};
use async_stream::try_stream;
use chrono::NaiveDateTime;
use futures::{Stream, StreamExt};
use tracing::{debug, info};

/// Where a walk ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Follow next-page links until there are none
    Exhausted,

    /// Do not fetch pages numbered above this one
    LastPage(u32),

    /// Stop at the first playlist at or before the newest one already stored
    KnownLatest {
        external_id: i64,
        timeslot: NaiveDateTime,
    },
}

impl StopCondition {
    fn reached_by(&self, playlist: &RawPlaylist) -> bool {
        match self {
            StopCondition::KnownLatest {
                external_id,
                timeslot,
            } => playlist.timeslot <= *timeslot || playlist.external_id == *external_id,
            _ => false,
        }
    }

    fn excludes_page(&self, page: Option<u32>) -> bool {
        match self {
            StopCondition::LastPage(last) => page.unwrap_or(1) > *last,
            _ => false,
        }
    }
}

/// Playlists in archive order (newest first), starting at `start_page`
pub fn walk_playlists<'a, A>(
    source: &'a A,
    start_page: Option<u32>,
    stop: StopCondition,
) -> impl Stream<Item = Result<RawPlaylist, ArchiveError>> + 'a
where
    A: ArchiveSource + ?Sized,
{
    try_stream! {
        let mut page = start_page;

        'pages: loop {
            if stop.excludes_page(page) {
                debug!(?page, "Page beyond last requested page, stopping walk");
                break 'pages;
            }

            let show = source.show_page(page).await?;
            debug!(?page, items = show.items.len(), next_page = ?show.next_page, "Walking show page");

            for playlist in show.items {
                if stop.reached_by(&playlist) {
                    info!(
                        external_id = playlist.external_id,
                        timeslot = %playlist.timeslot,
                        "Reached already ingested playlist, stopping walk"
                    );
                    break 'pages;
                }
                yield playlist;
            }

            match show.next_page {
                Some(next) => page = Some(next),
                None => break 'pages,
            }
        }
    }
}

/// Each playlist followed by its spins in airing order
///
/// Spins of a playlist are fetched only after the playlist item was pulled.
pub fn with_spins<'a, A, S>(
    source: &'a A,
    playlists: S,
) -> impl Stream<Item = Result<RawItem, ArchiveError>> + 'a
where
    A: ArchiveSource + ?Sized,
    S: Stream<Item = Result<RawPlaylist, ArchiveError>> + 'a,
{
    try_stream! {
        futures::pin_mut!(playlists);

        while let Some(playlist) = playlists.next().await {
            let playlist = playlist?;
            let external_id = playlist.external_id;
            yield RawItem::Playlist(playlist);

            let spins = source.playlist_spins(external_id).await?;
            for item in RawItem::spins_of(external_id, spins) {
                yield item;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{RawSpin, ShowPage};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use futures::TryStreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn playlist(external_id: i64, day: u32) -> RawPlaylist {
        RawPlaylist {
            external_id,
            timeslot: NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_opt(20, 0, 0)
                .unwrap(),
            title: String::new(),
            description: None,
        }
    }

    /// Three pages of two playlists each, newest first
    struct PagedArchive {
        fetches: AtomicUsize,
    }

    impl PagedArchive {
        fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ArchiveSource for PagedArchive {
        async fn show_page(&self, page: Option<u32>) -> Result<ShowPage, ArchiveError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let page = page.unwrap_or(1);
            let newest_day = 30 - (page - 1) * 2;
            Ok(ShowPage {
                items: vec![
                    playlist(newest_day as i64, newest_day),
                    playlist(newest_day as i64 - 1, newest_day - 1),
                ],
                next_page: (page < 3).then_some(page + 1),
            })
        }

        async fn playlist_spins(&self, _external_id: i64) -> Result<Vec<RawSpin>, ArchiveError> {
            Ok(Vec::new())
        }
    }

    async fn ids<S>(stream: S) -> Vec<i64>
    where
        S: Stream<Item = Result<RawPlaylist, ArchiveError>>,
    {
        stream
            .map_ok(|p| p.external_id)
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_exhausted_walk_visits_every_page() {
        let archive = PagedArchive::new();
        let walked = ids(walk_playlists(&archive, None, StopCondition::Exhausted)).await;

        assert_eq!(walked, vec![30, 29, 28, 27, 26, 25]);
        assert_eq!(archive.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_last_page_bounds_the_walk() {
        let archive = PagedArchive::new();
        let walked = ids(walk_playlists(&archive, Some(2), StopCondition::LastPage(2))).await;

        assert_eq!(walked, vec![28, 27]);
        assert_eq!(archive.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_known_latest_stops_without_fetching_further_pages() {
        let archive = PagedArchive::new();
        let known = playlist(29, 29);
        let stop = StopCondition::KnownLatest {
            external_id: known.external_id,
            timeslot: known.timeslot,
        };

        let walked = ids(walk_playlists(&archive, None, stop)).await;

        assert_eq!(walked, vec![30]);
        assert_eq!(archive.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_walk_is_lazy() {
        let archive = PagedArchive::new();
        let stream = walk_playlists(&archive, None, StopCondition::Exhausted);
        futures::pin_mut!(stream);

        assert_eq!(archive.fetches.load(Ordering::SeqCst), 0);
        stream.next().await.unwrap().unwrap();
        stream.next().await.unwrap().unwrap();
        assert_eq!(archive.fetches.load(Ordering::SeqCst), 1);
        stream.next().await.unwrap().unwrap();
        assert_eq!(archive.fetches.load(Ordering::SeqCst), 2);
    }
}
