//! Dataset preparation filter
//!
//! Trims the raw dataset before enrichment: duration outliers beyond the
//! Tukey fences (1.5·IQR past the quartiles), spoken-word rows
//! (`speechiness ≥ 0.66`), and near-pure instrumentals
//! (`instrumentalness ≥ 0.9`). Pure and synchronous; runs once up front.

use eramap_common::TrackRecord;
use tracing::info;

const SPEECHINESS_CUTOFF: f64 = 0.66;
const INSTRUMENTALNESS_CUTOFF: f64 = 0.9;

/// Counts from one filter pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSummary {
    pub input: usize,
    pub kept: usize,
}

/// Drop outlier rows, preserving input order.
pub fn filter_outliers(records: Vec<TrackRecord>) -> (Vec<TrackRecord>, FilterSummary) {
    let input = records.len();

    let mut durations: Vec<f64> = records.iter().map(|r| r.duration_ms).collect();
    durations.sort_by(|a, b| a.total_cmp(b));

    let q1 = quantile(&durations, 0.25);
    let q3 = quantile(&durations, 0.75);
    let iqr = q3 - q1;
    let lower_bound = q1 - 1.5 * iqr;
    let upper_bound = q3 + 1.5 * iqr;

    let kept: Vec<TrackRecord> = records
        .into_iter()
        .filter(|r| {
            r.duration_ms >= lower_bound
                && r.duration_ms <= upper_bound
                && r.speechiness < SPEECHINESS_CUTOFF
                && r.instrumentalness < INSTRUMENTALNESS_CUTOFF
        })
        .collect();

    let summary = FilterSummary {
        input,
        kept: kept.len(),
    };
    info!(
        input = summary.input,
        kept = summary.kept,
        dropped = summary.input - summary.kept,
        "outlier filter applied"
    );
    (kept, summary)
}

/// Linear-interpolated quantile over pre-sorted values.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(duration_ms: f64, speechiness: f64, instrumentalness: f64) -> TrackRecord {
        TrackRecord {
            track_id: "id".to_string(),
            artists: "Artist".to_string(),
            track_name: "Track".to_string(),
            album_name: "Album".to_string(),
            track_genre: String::new(),
            duration_ms,
            energy: 0.5,
            valence: 0.5,
            speechiness,
            instrumentalness,
            year: None,
        }
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.25), 1.75);
        assert_eq!(quantile(&values, 0.5), 2.5);
        assert_eq!(quantile(&values, 0.75), 3.25);
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
    }

    #[test]
    fn test_duration_outliers_dropped() {
        let mut records: Vec<TrackRecord> =
            (0..20).map(|i| record(180_000.0 + i as f64, 0.1, 0.0)).collect();
        records.push(record(3_600_000.0, 0.1, 0.0)); // an hour-long outlier

        let (kept, summary) = filter_outliers(records);
        assert_eq!(summary.input, 21);
        assert_eq!(summary.kept, 20);
        assert!(kept.iter().all(|r| r.duration_ms < 1_000_000.0));
    }

    #[test]
    fn test_speech_and_instrumental_cutoffs() {
        let records = vec![
            record(180_000.0, 0.1, 0.0),
            record(180_000.0, 0.7, 0.0),  // spoken word
            record(180_000.0, 0.1, 0.95), // instrumental
            record(180_000.0, 0.65, 0.89),
        ];

        let (kept, summary) = filter_outliers(records);
        assert_eq!(summary.kept, 2);
        assert!(kept
            .iter()
            .all(|r| r.speechiness < 0.66 && r.instrumentalness < 0.9));
    }

    #[test]
    fn test_empty_input() {
        let (kept, summary) = filter_outliers(Vec::new());
        assert!(kept.is_empty());
        assert_eq!(summary, FilterSummary { input: 0, kept: 0 });
    }
}
