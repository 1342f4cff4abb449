//! Work partitioner
//!
//! Assigns every pending record to exactly one lane, deterministically, by
//! its position in the dataset. Records that already carry a year are skipped
//! entirely. The rule is positional, not load-balanced: lanes finish at
//! different times because the services behind them run at different speeds.

use super::Lane;
use eramap_common::TrackRecord;

/// The three disjoint index queues produced by partitioning.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LanePartition {
    pub spotify: Vec<usize>,
    pub musicbrainz: Vec<usize>,
    pub discogs: Vec<usize>,
}

impl LanePartition {
    /// Total pending records across all lanes.
    pub fn total_pending(&self) -> usize {
        self.spotify.len() + self.musicbrainz.len() + self.discogs.len()
    }

    pub fn lane(&self, lane: Lane) -> &[usize] {
        match lane {
            Lane::Spotify => &self.spotify,
            Lane::MusicBrainz => &self.musicbrainz,
            Lane::Discogs => &self.discogs,
        }
    }
}

/// Partition the pending records into three lanes.
///
/// Position `i` counts all records, resolved ones included, so the same
/// dataset always partitions the same way across resumed runs:
/// `i % 3 == 0` → Spotify, else `i % 2 == 0` → MusicBrainz, else Discogs.
pub fn partition_pending(records: &[TrackRecord]) -> LanePartition {
    let mut partition = LanePartition::default();

    for (i, record) in records.iter().enumerate() {
        if record.is_resolved() {
            continue;
        }
        if i % 3 == 0 {
            partition.spotify.push(i);
        } else if i % 2 == 0 {
            partition.musicbrainz.push(i);
        } else {
            partition.discogs.push(i);
        }
    }

    partition
}
