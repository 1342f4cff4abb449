//! Density grids
//!
//! 2-D Gaussian kernel density estimates over the valence/energy unit
//! square, one normalized layer per genre cluster per decade, plus the
//! dominant-cluster map (per-cell argmax with an intensity channel). Grids
//! serialize to JSON; rendering them is somebody else's job.

use crate::preprocess::AnalysisRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Density below this fraction of the layer's peak is zeroed out.
pub const DEFAULT_DENSITY_THRESHOLD: f64 = 0.4;

/// A square grid of densities over [0,1]², row-major, `resolution²` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub resolution: usize,
    pub values: Vec<f64>,
}

impl Grid {
    pub fn zeros(resolution: usize) -> Self {
        Self {
            resolution,
            values: vec![0.0; resolution * resolution],
        }
    }

    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.resolution + col]
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

/// One decade's density layers, keyed by genre cluster label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecadeLayers {
    pub decade: i32,
    pub layers: BTreeMap<String, Grid>,
}

/// Dominant-cluster map: per cell, which layer peaks there and how strongly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DominantMap {
    pub resolution: usize,
    /// Cluster labels indexed by `cluster_index`
    pub clusters: Vec<String>,
    /// Per-cell index into `clusters`, -1 where every layer is zero
    pub cluster_index: Vec<i32>,
    /// Per-cell dominant density, normalized to the map's peak
    pub intensity: Vec<f64>,
}

/// Gaussian KDE of `points` on a `resolution`² grid over [0,1]².
///
/// Scott's-rule bandwidth per dimension; the result is normalized to a peak
/// of 1 and values under `threshold` are cut to zero. Fewer than two points
/// yield an all-zero grid (a bandwidth needs a spread to estimate).
pub fn compute_kde(points: &[(f64, f64)], resolution: usize, threshold: f64) -> Grid {
    if points.len() < 2 {
        return Grid::zeros(resolution);
    }

    let n = points.len() as f64;
    let factor = n.powf(-1.0 / 6.0); // Scott's rule, d = 2

    let bandwidth_x = (std_dev(points.iter().map(|p| p.0)) * factor).max(1e-3);
    let bandwidth_y = (std_dev(points.iter().map(|p| p.1)) * factor).max(1e-3);

    let mut grid = Grid::zeros(resolution);
    let step = 1.0 / (resolution - 1) as f64;

    for row in 0..resolution {
        let y = row as f64 * step;
        for col in 0..resolution {
            let x = col as f64 * step;
            let mut density = 0.0;
            for &(px, py) in points {
                let dx = (x - px) / bandwidth_x;
                let dy = (y - py) / bandwidth_y;
                density += (-0.5 * (dx * dx + dy * dy)).exp();
            }
            grid.values[row * resolution + col] = density;
        }
    }

    normalize_and_threshold(&mut grid, threshold);
    grid
}

/// Normalize a grid to peak 1 and zero everything under `threshold`.
pub fn normalize_and_threshold(grid: &mut Grid, threshold: f64) {
    let max = grid.max();
    if max <= 0.0 {
        grid.values.iter_mut().for_each(|v| *v = 0.0);
        return;
    }
    for value in grid.values.iter_mut() {
        *value /= max;
        if *value < threshold {
            *value = 0.0;
        }
    }
}

/// One density layer per cluster with at least two points in the decade.
pub fn compute_decade_layers(
    rows: &[AnalysisRow],
    decade: i32,
    resolution: usize,
    threshold: f64,
) -> DecadeLayers {
    let mut by_cluster: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.decade == decade) {
        by_cluster
            .entry(row.genre_cluster.clone())
            .or_default()
            .push((row.valence, row.energy));
    }

    let layers = by_cluster
        .into_iter()
        .filter(|(_, points)| points.len() >= 2)
        .map(|(cluster, points)| (cluster, compute_kde(&points, resolution, threshold)))
        .collect();

    DecadeLayers { decade, layers }
}

/// Collapse a layer set into the dominant-cluster map.
pub fn dominant_map(layers: &BTreeMap<String, Grid>, resolution: usize) -> DominantMap {
    let clusters: Vec<String> = layers.keys().cloned().collect();
    let cells = resolution * resolution;

    let mut cluster_index = vec![-1i32; cells];
    let mut intensity = vec![0.0f64; cells];

    for cell in 0..cells {
        let mut best = -1i32;
        let mut best_density = 0.0f64;
        for (i, cluster) in clusters.iter().enumerate() {
            let density = layers[cluster].values[cell];
            if density > best_density {
                best_density = density;
                best = i as i32;
            }
        }
        cluster_index[cell] = best;
        intensity[cell] = best_density;
    }

    // normalize intensity to the map's peak
    let peak = intensity.iter().copied().fold(0.0, f64::max);
    if peak > 0.0 {
        intensity.iter_mut().for_each(|v| *v /= peak);
    }

    DominantMap {
        resolution,
        clusters,
        cluster_index,
        intensity,
    }
}

fn std_dev(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    let variance = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    variance.sqrt()
}
