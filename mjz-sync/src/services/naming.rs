//! Derived playlist naming and track selection

use mjz_common::config::SeriesConfig;
use mjz_common::db::{BroadcastPlaylist, Spin};
use mjz_common::human_time::join_air_dates;

/// `<label> <number>`, followed by `: <title>` when any airing has a title
///
/// The first non-empty title in association order is used.
pub fn episode_name(series: &SeriesConfig, number: i64, airings: &[BroadcastPlaylist]) -> String {
    match airings.iter().map(|p| p.title.trim()).find(|t| !t.is_empty()) {
        Some(title) => format!("{} {}: {}", series.label, number, title),
        None => format!("{} {}", series.label, number),
    }
}

/// Air dates of every airing, followed by the series attribution
pub fn episode_description(series: &SeriesConfig, airings: &[BroadcastPlaylist]) -> String {
    let dates = join_air_dates(airings.iter().map(|p| &p.timeslot));
    if series.attribution.is_empty() {
        dates
    } else {
        format!("{} {}", dates, series.attribution)
    }
}

/// Tracks to publish from the first airing's spins
///
/// The opening spin is the show's theme and is left out; the rest keep
/// their airing order.
pub fn track_list(spins: &[Spin]) -> Vec<&Spin> {
    let mut ordered: Vec<&Spin> = spins.iter().collect();
    ordered.sort_by_key(|spin| spin.position);
    ordered.into_iter().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn airing(id: i64, day: u32, title: &str) -> BroadcastPlaylist {
        BroadcastPlaylist {
            id,
            external_id: id,
            timeslot: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(20, 0, 0)
                .unwrap(),
            title: title.to_string(),
            description: None,
            episode_id: Some(1),
        }
    }

    fn spin(id: i64, position: i64) -> Spin {
        Spin {
            id,
            external_id: id,
            playlist_id: 1,
            position,
            artist: "A".to_string(),
            title: format!("T{}", id),
            album: None,
            year: None,
            start_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            song_id: None,
        }
    }

    #[test]
    fn test_name_uses_first_non_empty_title() {
        let series = SeriesConfig::default();
        let airings = vec![airing(1, 6, ""), airing(2, 13, "Vortex"), airing(3, 20, "Other")];

        assert_eq!(episode_name(&series, 42, &airings), "Mondo Jazz 42: Vortex");
        assert_eq!(episode_name(&series, 42, &airings[..1]), "Mondo Jazz 42");
    }

    #[test]
    fn test_description_lists_every_air_date() {
        let series = SeriesConfig::default();
        let airings = vec![airing(1, 6, ""), airing(2, 13, "")];

        assert_eq!(
            episode_description(&series, &airings),
            "Sat Jan 06 2024 at 08:00 PM, Sat Jan 13 2024 at 08:00 PM \
             on Radio Free Brooklyn with Ludovico Granvassu"
        );
    }

    #[test]
    fn test_track_list_skips_opening_spin() {
        let spins = vec![spin(12, 2), spin(10, 0), spin(11, 1)];

        let ids: Vec<i64> = track_list(&spins).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![11, 12]);
        assert!(track_list(&spins[..0]).is_empty());
    }
}
