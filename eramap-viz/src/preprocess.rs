//! Analysis preprocessing
//!
//! Turns the enriched dataset into analysis rows: raw per-track genres are
//! folded into a dozen coarse groups, rows without a usable year are
//! dropped, each group is trimmed of valence/energy outliers, and rows get
//! their decade label. Optionally downsamples to a cap for the density
//! stages.

use eramap_common::TrackRecord;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Genre groups excluded from the analysis: too heterogeneous to map.
const EXCLUDED_GROUPS: [&str; 3] = ["Other", "Entertainment / Kids", "Chill / Ambient"];

/// Tracks older than this are too sparse in the source data to chart.
const MIN_YEAR: i32 = 1980;

/// Fixed seed so a re-run reproduces the same downsample.
const SAMPLE_SEED: u64 = 42;

/// One row of the analysis dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub valence: f64,
    pub energy: f64,
    pub genre_group: String,
    /// Filled by the clustering stage
    #[serde(default)]
    pub genre_cluster: String,
    pub decade: i32,
}

/// Fold a raw per-track genre tag into its coarse group.
pub fn simplify_genre(genre: &str) -> &'static str {
    match genre.to_lowercase().as_str() {
        "pop" | "power-pop" | "pop-film" | "party" | "happy" => "Pop",
        "rock" | "alt-rock" | "hard-rock" | "punk" | "punk-rock" | "grunge" | "garage"
        | "psych-rock" | "rock-n-roll" | "rockabilly" => "Rock",
        "hip-hop" | "rap" | "r-n-b" => "Hip-Hop / R&B",
        "electronic" | "edm" | "electro" | "trance" | "house" | "techno" | "deep-house"
        | "minimal-techno" | "progressive-house" | "club" | "dance" | "dancehall"
        | "detroit-techno" | "chicago-house" | "drum-and-bass" | "dubstep" => "Electronic",
        "classical" | "opera" | "piano" | "new-age" => "Classical",
        "jazz" | "blues" | "funk" | "soul" | "groove" | "gospel" => "Jazz / Soul",
        "country" | "folk" | "bluegrass" | "honky-tonk" | "singer-songwriter" | "songwriter" => {
            "Country / Folk"
        }
        "metal" | "heavy-metal" | "death-metal" | "black-metal" | "metalcore" | "hardcore"
        | "grindcore" => "Metal",
        "latin" | "latino" | "reggaeton" | "salsa" | "samba" | "brazil" | "forro" | "pagode"
        | "mpb" | "sertanejo" | "tango" => "Latin",
        "k-pop" | "j-pop" | "j-rock" | "anime" | "j-idol" | "j-dance" | "mandopop"
        | "cantopop" => "Asian Pop",
        "ambient" | "chill" | "sleep" | "study" | "acoustic" => "Chill / Ambient",
        "comedy" | "kids" | "children" | "disney" | "show-tunes" => "Entertainment / Kids",
        "indie" | "indie-pop" | "alternative" => "Indie / Alternative",
        _ => "Other",
    }
}

/// Build the analysis rows from the enriched dataset.
///
/// `sample_cap` bounds the output row count (the density stages do not need
/// more); sampling is seeded and therefore reproducible.
pub fn preprocess(records: &[TrackRecord], sample_cap: Option<usize>) -> Vec<AnalysisRow> {
    let mut rows: Vec<AnalysisRow> = records
        .iter()
        .filter_map(|record| {
            let year = record.year?;
            if year < MIN_YEAR {
                return None;
            }
            let group = simplify_genre(&record.track_genre);
            if EXCLUDED_GROUPS.contains(&group) {
                return None;
            }
            Some(AnalysisRow {
                valence: record.valence,
                energy: record.energy,
                genre_group: group.to_string(),
                genre_cluster: String::new(),
                decade: (year / 10) * 10,
            })
        })
        .collect();

    rows = trim_group_outliers(rows);

    if let Some(cap) = sample_cap {
        if rows.len() > cap {
            let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
            rows.shuffle(&mut rng);
            rows.truncate(cap);
        }
    }

    info!(rows = rows.len(), "analysis rows prepared");
    rows
}

/// Per-group IQR trim on valence and energy (Tukey fences, 1.5·IQR).
fn trim_group_outliers(rows: Vec<AnalysisRow>) -> Vec<AnalysisRow> {
    let mut by_group: HashMap<String, Vec<AnalysisRow>> = HashMap::new();
    for row in rows {
        by_group.entry(row.genre_group.clone()).or_default().push(row);
    }

    let mut kept = Vec::new();
    for (_, group_rows) in by_group {
        let valence_bounds = tukey_fences(group_rows.iter().map(|r| r.valence));
        let energy_bounds = tukey_fences(group_rows.iter().map(|r| r.energy));
        kept.extend(group_rows.into_iter().filter(|r| {
            r.valence >= valence_bounds.0
                && r.valence <= valence_bounds.1
                && r.energy >= energy_bounds.0
                && r.energy <= energy_bounds.1
        }));
    }
    kept
}

fn tukey_fences(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut sorted: Vec<f64> = values.collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted.is_empty() {
        return (f64::NEG_INFINITY, f64::INFINITY);
    }
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    (q1 - 1.5 * iqr, q3 + 1.5 * iqr)
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
