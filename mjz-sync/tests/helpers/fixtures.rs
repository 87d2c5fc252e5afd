//! Record fixtures and database shortcuts

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::stream;
use mjz_sync::archive::{RawItem, RawPlaylist, RawSpin};
use mjz_sync::catalog::CatalogTrack;
use mjz_sync::services::write_batch;
use sqlx::SqlitePool;

/// 8 PM on the given day of January 2024
pub fn timeslot(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(20, 0, 0)
        .unwrap()
}

pub fn raw_playlist(external_id: i64, day: u32, title: &str) -> RawPlaylist {
    RawPlaylist {
        external_id,
        timeslot: timeslot(day),
        title: title.to_string(),
        description: None,
    }
}

pub fn raw_spin(external_id: i64, artist: &str, title: &str) -> RawSpin {
    RawSpin {
        external_id,
        artist: artist.to_string(),
        title: title.to_string(),
        album: None,
        year: None,
        start_time: NaiveTime::from_hms_opt(20, (external_id % 60) as u32, 0).unwrap(),
    }
}

pub fn catalog_track(catalog_id: &str, title: &str) -> CatalogTrack {
    CatalogTrack {
        catalog_id: catalog_id.to_string(),
        title: title.to_string(),
        album: Some("Catalog Album".to_string()),
        release_date: Some("1961-05-01".to_string()),
        artists: vec!["Catalog Artist".to_string()],
    }
}

/// Store a playlist with its spins, returning the playlist row id
pub async fn seed_playlist(pool: &SqlitePool, playlist: RawPlaylist, spins: Vec<RawSpin>) -> i64 {
    let external_id = playlist.external_id;
    let mut items = vec![RawItem::Playlist(playlist)];
    items.extend(RawItem::spins_of(external_id, spins));

    let mut tx = pool.begin().await.unwrap();
    let report = write_batch(&mut tx, stream::iter(items.into_iter().map(Ok)))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(report.failed, 0);

    sqlx::query_scalar::<_, i64>("SELECT id FROM broadcast_playlists WHERE external_id = ?")
        .bind(external_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
