//! Aggregate summaries
//!
//! Per-cluster and per-decade/cluster aggregates over the analysis rows,
//! serialized as one JSON document: song counts and mean energy/valence,
//! rounded to two decimals.

use crate::preprocess::AnalysisRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub num_songs: usize,
    pub avg_energy: f64,
    pub avg_valence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryMetadata {
    pub total_records: usize,
}

/// The full summary document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreSummary {
    pub metadata: SummaryMetadata,
    /// cluster → stats over the whole span
    pub clusters: BTreeMap<String, ClusterStats>,
    /// decade → cluster → stats
    pub decades: BTreeMap<String, BTreeMap<String, ClusterStats>>,
}

/// Aggregate the analysis rows.
pub fn summarize(rows: &[AnalysisRow]) -> GenreSummary {
    let mut clusters: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut decades: BTreeMap<String, BTreeMap<String, Accumulator>> = BTreeMap::new();

    for row in rows {
        clusters
            .entry(row.genre_cluster.clone())
            .or_default()
            .add(row);
        decades
            .entry(row.decade.to_string())
            .or_default()
            .entry(row.genre_cluster.clone())
            .or_default()
            .add(row);
    }

    GenreSummary {
        metadata: SummaryMetadata {
            total_records: rows.len(),
        },
        clusters: clusters
            .into_iter()
            .map(|(cluster, acc)| (cluster, acc.stats()))
            .collect(),
        decades: decades
            .into_iter()
            .map(|(decade, inner)| {
                (
                    decade,
                    inner
                        .into_iter()
                        .map(|(cluster, acc)| (cluster, acc.stats()))
                        .collect(),
                )
            })
            .collect(),
    }
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    energy_sum: f64,
    valence_sum: f64,
}

impl Accumulator {
    fn add(&mut self, row: &AnalysisRow) {
        self.count += 1;
        self.energy_sum += row.energy;
        self.valence_sum += row.valence;
    }

    fn stats(&self) -> ClusterStats {
        ClusterStats {
            num_songs: self.count,
            avg_energy: round2(self.energy_sum / self.count as f64),
            avg_valence: round2(self.valence_sum / self.count as f64),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cluster: &str, decade: i32, valence: f64, energy: f64) -> AnalysisRow {
        AnalysisRow {
            valence,
            energy,
            genre_group: cluster.to_string(),
            genre_cluster: cluster.to_string(),
            decade,
        }
    }

    #[test]
    fn test_cluster_and_decade_aggregates() {
        let rows = vec![
            row("Pop", 1990, 0.8, 0.6),
            row("Pop", 1990, 0.6, 0.4),
            row("Pop", 2000, 0.5, 0.5),
            row("Metal", 1990, 0.2, 0.9),
        ];

        let summary = summarize(&rows);

        assert_eq!(summary.metadata.total_records, 4);
        assert_eq!(
            summary.clusters["Pop"],
            ClusterStats {
                num_songs: 3,
                avg_energy: 0.5,
                avg_valence: 0.63,
            }
        );
        assert_eq!(summary.decades["1990"]["Pop"].num_songs, 2);
        assert_eq!(summary.decades["1990"]["Metal"].num_songs, 1);
        assert_eq!(summary.decades["2000"]["Pop"].num_songs, 1);
        assert!(!summary.decades.contains_key("2010"));
    }

    #[test]
    fn test_rounding() {
        let rows = vec![
            row("X", 1990, 1.0 / 3.0, 2.0 / 3.0),
            row("X", 1990, 1.0 / 3.0, 2.0 / 3.0),
        ];
        let summary = summarize(&rows);
        assert_eq!(summary.clusters["X"].avg_valence, 0.33);
        assert_eq!(summary.clusters["X"].avg_energy, 0.67);
    }

    #[test]
    fn test_empty_rows() {
        let summary = summarize(&[]);
        assert_eq!(summary.metadata.total_records, 0);
        assert!(summary.clusters.is_empty());
        assert!(summary.decades.is_empty());
    }

    #[test]
    fn test_serializes_to_json() {
        let rows = vec![row("Pop", 1990, 0.5, 0.5), row("Pop", 1990, 0.7, 0.7)];
        let summary = summarize(&rows);
        let json = serde_json::to_string_pretty(&summary).unwrap();
        assert!(json.contains("\"total_records\": 2"));
        assert!(json.contains("\"Pop\""));
    }
}
