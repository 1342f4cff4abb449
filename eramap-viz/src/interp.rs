//! Temporal interpolation between decade grids
//!
//! Produces intermediate density frames between consecutive decades by
//! evaluating a per-cell cubic Hermite spline (finite-difference tangents,
//! so it degrades to Catmull-Rom on the uniform decade spacing) across each
//! cluster's available decades. A cluster present in fewer than two decades
//! cannot be interpolated and is skipped; results are clamped at zero and
//! threshold-masked like the anchor grids.

use crate::kde::Grid;
use std::collections::BTreeMap;
use tracing::debug;

/// Interpolate every cluster's density at `target_year`.
///
/// `frames[i]` holds the layers for `decades[i]`; the two must be parallel
/// and the decades ascending.
pub fn interpolate_layers(
    frames: &[&BTreeMap<String, Grid>],
    decades: &[i32],
    target_year: f64,
    threshold: f64,
) -> BTreeMap<String, Grid> {
    assert_eq!(frames.len(), decades.len(), "frames and decades must be parallel");

    let mut clusters: Vec<&String> = frames.iter().flat_map(|f| f.keys()).collect();
    clusters.sort();
    clusters.dedup();

    let mut interpolated = BTreeMap::new();

    for cluster in clusters {
        // this cluster's anchors, in decade order
        let mut xs = Vec::new();
        let mut anchor_grids = Vec::new();
        for (frame, &decade) in frames.iter().zip(decades) {
            if let Some(grid) = frame.get(cluster) {
                xs.push(decade as f64);
                anchor_grids.push(grid);
            }
        }

        if anchor_grids.len() < 2 {
            debug!(%cluster, anchors = anchor_grids.len(), "too few anchors to interpolate");
            continue;
        }

        let resolution = anchor_grids[0].resolution;
        let mut grid = Grid::zeros(resolution);

        for cell in 0..resolution * resolution {
            let ys: Vec<f64> = anchor_grids.iter().map(|g| g.values[cell]).collect();
            let value = hermite_eval(&xs, &ys, target_year).max(0.0);
            grid.values[cell] = if value >= threshold { value } else { 0.0 };
        }

        interpolated.insert(cluster.clone(), grid);
    }

    interpolated
}

/// Evaluate a piecewise cubic Hermite spline through `(xs, ys)` at `x`.
///
/// Tangents come from centered finite differences (one-sided at the ends);
/// evaluation outside the anchor range extrapolates the boundary segment.
pub fn hermite_eval(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    debug_assert!(xs.len() == ys.len() && xs.len() >= 2);

    let n = xs.len();
    let tangent = |i: usize| -> f64 {
        if i == 0 {
            (ys[1] - ys[0]) / (xs[1] - xs[0])
        } else if i == n - 1 {
            (ys[n - 1] - ys[n - 2]) / (xs[n - 1] - xs[n - 2])
        } else {
            (ys[i + 1] - ys[i - 1]) / (xs[i + 1] - xs[i - 1])
        }
    };

    // bracketing segment, clamped to the boundary segments for extrapolation
    let mut segment = 0;
    while segment + 2 < n && x >= xs[segment + 1] {
        segment += 1;
    }

    let (x0, x1) = (xs[segment], xs[segment + 1]);
    let (y0, y1) = (ys[segment], ys[segment + 1]);
    let h = x1 - x0;
    let t = (x - x0) / h;
    let (m0, m1) = (tangent(segment) * h, tangent(segment + 1) * h);

    let t2 = t * t;
    let t3 = t2 * t;
    (2.0 * t3 - 3.0 * t2 + 1.0) * y0
        + (t3 - 2.0 * t2 + t) * m0
        + (-2.0 * t3 + 3.0 * t2) * y1
        + (t3 - t2) * m1
}
