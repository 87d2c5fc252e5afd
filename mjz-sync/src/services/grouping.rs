//! Episode grouping
//!
//! Re-airings of an episode carry the same set of spins. Ungrouped playlists
//! are keyed by the exact (artist, title) pairs they played; every distinct
//! key becomes a new episode. The whole pass is one transaction, so a failure
//! leaves no playlist assigned.

use crate::db::{episodes, playlists, spins};
use mjz_common::db::{BroadcastPlaylist, Episode};
use mjz_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Spin identity used to recognize re-airings
pub type Fingerprint = BTreeSet<(String, String)>;

/// One episode created by a grouping pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeGroup {
    pub episode: Episode,
    /// Member playlists in association order
    pub playlist_ids: Vec<i64>,
}

/// Partition playlists by fingerprint, keeping first-appearance order
///
/// Input order is preserved both across groups and within each group.
pub fn partition_by_fingerprint(
    keyed: Vec<(BroadcastPlaylist, Fingerprint)>,
) -> Vec<Vec<BroadcastPlaylist>> {
    let mut groups: Vec<Vec<BroadcastPlaylist>> = Vec::new();
    let mut index: HashMap<Fingerprint, usize> = HashMap::new();

    for (playlist, fingerprint) in keyed {
        match index.get(&fingerprint) {
            Some(&i) => groups[i].push(playlist),
            None => {
                index.insert(fingerprint, groups.len());
                groups.push(vec![playlist]);
            }
        }
    }

    groups
}

/// Assign every ungrouped playlist that has spins to a new episode
///
/// Groups are ordered by their most recent airing; the most recent group
/// gets `starting_number` and each older group the next lower number.
pub async fn group_into_episodes(
    pool: &SqlitePool,
    starting_number: i64,
) -> Result<Vec<EpisodeGroup>> {
    let mut tx = pool.begin().await?;

    let mut keyed = Vec::new();
    for playlist in playlists::ungrouped_playlists(&mut tx).await? {
        let fingerprint: Fingerprint = spins::spins_for_playlist(&mut tx, playlist.id)
            .await?
            .into_iter()
            .map(|spin| (spin.artist, spin.title))
            .collect();

        if fingerprint.is_empty() {
            debug!(external_id = playlist.external_id, "Playlist has no spins, not grouping");
            continue;
        }

        keyed.push((playlist, fingerprint));
    }

    let groups = partition_by_fingerprint(keyed);
    if groups.is_empty() {
        info!("No ungrouped playlists");
        return Ok(Vec::new());
    }

    if starting_number < groups.len() as i64 {
        return Err(Error::InvalidInput(format!(
            "Starting number {} leaves no positive number for {} episodes",
            starting_number,
            groups.len()
        )));
    }

    let mut created = Vec::with_capacity(groups.len());
    for (offset, group) in groups.into_iter().enumerate() {
        let number = starting_number - offset as i64;
        let episode = episodes::insert_episode(&mut tx, number).await?;

        let mut playlist_ids = Vec::with_capacity(group.len());
        for playlist in &group {
            playlists::set_episode(&mut tx, playlist.id, episode.id).await?;
            playlist_ids.push(playlist.id);
        }

        debug!(number, airings = playlist_ids.len(), "Grouped episode");
        created.push(EpisodeGroup {
            episode,
            playlist_ids,
        });
    }

    tx.commit().await?;

    info!(
        episodes = created.len(),
        first = starting_number,
        last = starting_number - created.len() as i64 + 1,
        "Grouped playlists into episodes"
    );

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn playlist(id: i64) -> BroadcastPlaylist {
        BroadcastPlaylist {
            id,
            external_id: id * 100,
            timeslot: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(20, 0, 0)
                .unwrap(),
            title: String::new(),
            description: None,
            episode_id: None,
        }
    }

    fn fingerprint(pairs: &[(&str, &str)]) -> Fingerprint {
        pairs
            .iter()
            .map(|(a, t)| (a.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn test_partition_groups_equal_sets_regardless_of_order() {
        let groups = partition_by_fingerprint(vec![
            (playlist(1), fingerprint(&[("A", "x"), ("B", "y")])),
            (playlist(2), fingerprint(&[("C", "z")])),
            (playlist(3), fingerprint(&[("B", "y"), ("A", "x")])),
        ]);

        let ids: Vec<Vec<i64>> = groups
            .iter()
            .map(|g| g.iter().map(|p| p.id).collect())
            .collect();
        assert_eq!(ids, vec![vec![1, 3], vec![2]]);
    }

    #[test]
    fn test_partition_distinguishes_subsets() {
        let groups = partition_by_fingerprint(vec![
            (playlist(1), fingerprint(&[("A", "x"), ("B", "y")])),
            (playlist(2), fingerprint(&[("A", "x")])),
        ]);

        assert_eq!(groups.len(), 2);
    }
}
