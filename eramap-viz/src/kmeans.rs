//! Genre-group clustering
//!
//! Merges the coarse genre groups into k clusters by running plain k-means
//! over each group's mean (valence, energy) point. A cluster's label is
//! derived from its member groups, so downstream output stays readable
//! without a hand-maintained name table.

use crate::preprocess::AnalysisRow;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

const MAX_ITERATIONS: usize = 100;
const CONVERGENCE_EPSILON: f64 = 1e-6;

/// Fixed seed: clustering must reproduce across runs.
const KMEANS_SEED: u64 = 42;

/// Assign a `genre_cluster` label to every row, clustering the genre groups
/// by their mean valence/energy. Returns the group → cluster-label mapping.
pub fn assign_clusters(rows: &mut [AnalysisRow], k: usize) -> BTreeMap<String, String> {
    // group means, in stable (sorted) group order
    let mut sums: BTreeMap<String, (f64, f64, usize)> = BTreeMap::new();
    for row in rows.iter() {
        let entry = sums.entry(row.genre_group.clone()).or_insert((0.0, 0.0, 0));
        entry.0 += row.valence;
        entry.1 += row.energy;
        entry.2 += 1;
    }

    let groups: Vec<String> = sums.keys().cloned().collect();
    let points: Vec<[f64; 2]> = sums
        .values()
        .map(|&(v, e, n)| [v / n as f64, e / n as f64])
        .collect();

    let assignments = kmeans(&points, k.min(points.len()).max(1), KMEANS_SEED);

    // label each cluster by its member groups
    let mut members: HashMap<usize, Vec<&str>> = HashMap::new();
    for (group, &cluster) in groups.iter().zip(&assignments) {
        members.entry(cluster).or_default().push(group);
    }
    let labels: HashMap<usize, String> = members
        .into_iter()
        .map(|(cluster, groups)| (cluster, groups.join(" + ")))
        .collect();

    let mapping: BTreeMap<String, String> = groups
        .iter()
        .zip(&assignments)
        .map(|(group, cluster)| (group.clone(), labels[cluster].clone()))
        .collect();

    for row in rows.iter_mut() {
        row.genre_cluster = mapping[&row.genre_group].clone();
    }

    info!(groups = groups.len(), clusters = labels.len(), "genre groups clustered");
    mapping
}

/// Plain k-means over 2-D points. Centroids are seeded from k distinct
/// points; iteration stops when every centroid moves less than epsilon.
pub fn kmeans(points: &[[f64; 2]], k: usize, seed: u64) -> Vec<usize> {
    assert!(k >= 1, "k must be at least 1");
    if points.is_empty() {
        return Vec::new();
    }
    let k = k.min(points.len());

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..points.len()).collect();
    indices.shuffle(&mut rng);
    let mut centroids: Vec<[f64; 2]> = indices[..k].iter().map(|&i| points[i]).collect();

    let mut assignments = vec![0usize; points.len()];

    for _ in 0..MAX_ITERATIONS {
        for (i, point) in points.iter().enumerate() {
            assignments[i] = nearest(point, &centroids);
        }

        let mut shift: f64 = 0.0;
        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            let mut sum = [0.0f64, 0.0];
            let mut count = 0usize;
            for (point, &assigned) in points.iter().zip(&assignments) {
                if assigned == cluster {
                    sum[0] += point[0];
                    sum[1] += point[1];
                    count += 1;
                }
            }
            // an emptied centroid stays where it is
            if count > 0 {
                let updated = [sum[0] / count as f64, sum[1] / count as f64];
                shift = shift.max(distance_sq(centroid, &updated).sqrt());
                *centroid = updated;
            }
        }

        if shift < CONVERGENCE_EPSILON {
            break;
        }
    }

    assignments
}

fn nearest(point: &[f64; 2], centroids: &[[f64; 2]]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let d = distance_sq(point, centroid);
        if d < best_distance {
            best_distance = d;
            best = i;
        }
    }
    best
}

fn distance_sq(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(group: &str, valence: f64, energy: f64) -> AnalysisRow {
        AnalysisRow {
            valence,
            energy,
            genre_group: group.to_string(),
            genre_cluster: String::new(),
            decade: 1990,
        }
    }

    #[test]
    fn test_kmeans_separates_obvious_clusters() {
        // two tight blobs in opposite corners
        let points = vec![
            [0.1, 0.1],
            [0.12, 0.09],
            [0.11, 0.12],
            [0.9, 0.9],
            [0.88, 0.91],
            [0.91, 0.89],
        ];
        let assignments = kmeans(&points, 2, 42);

        assert_eq!(assignments[0], assignments[1]);
        assert_eq!(assignments[0], assignments[2]);
        assert_eq!(assignments[3], assignments[4]);
        assert_eq!(assignments[3], assignments[5]);
        assert_ne!(assignments[0], assignments[3]);
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let points: Vec<[f64; 2]> = (0..30)
            .map(|i| [(i % 7) as f64 / 7.0, (i % 5) as f64 / 5.0])
            .collect();
        assert_eq!(kmeans(&points, 4, 42), kmeans(&points, 4, 42));
    }

    #[test]
    fn test_assign_clusters_groups_similar_genres() {
        let mut rows = vec![
            row("Metal", 0.2, 0.95),
            row("Metal", 0.25, 0.9),
            row("Rock", 0.22, 0.92),
            row("Classical", 0.3, 0.1),
            row("Classical", 0.28, 0.12),
        ];

        let mapping = assign_clusters(&mut rows, 2);

        // high-energy groups land together, away from Classical
        assert_eq!(mapping["Metal"], mapping["Rock"]);
        assert_ne!(mapping["Metal"], mapping["Classical"]);
        // every row got its label
        assert!(rows.iter().all(|r| !r.genre_cluster.is_empty()));
    }

    #[test]
    fn test_k_larger_than_group_count_is_clamped() {
        let mut rows = vec![row("Pop", 0.8, 0.7), row("Metal", 0.2, 0.9)];
        let mapping = assign_clusters(&mut rows, 10);
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_kmeans_empty_input() {
        assert!(kmeans(&[], 3, 42).is_empty());
    }
}
