//! Track record model
//!
//! One `TrackRecord` per dataset row. The identifying columns
//! (`track_id`, `artists`, `track_name`, `album_name`) feed the catalog
//! lookups; the audio-feature columns feed the genre/era analytics.
//!
//! A record whose `year` is unset is *pending*; once a year is written the
//! record is *resolved* and is never overwritten again (the enrichment engine
//! enforces this at the shared-state layer).

use serde::{Deserialize, Serialize};

/// One dataset row: a track plus its resolved or unresolved release year.
///
/// Serde-mapped directly onto the CSV columns. Columns the model does not
/// name are ignored on read; feature columns absent from an input file
/// default to zero so partially-populated datasets still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track_id: String,
    pub artists: String,
    pub track_name: String,
    pub album_name: String,
    #[serde(default)]
    pub track_genre: String,
    #[serde(default)]
    pub duration_ms: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub valence: f64,
    #[serde(default)]
    pub speechiness: f64,
    #[serde(default)]
    pub instrumentalness: f64,
    /// Release year; empty CSV cell (or a missing column) maps to `None`.
    #[serde(default)]
    pub year: Option<i32>,
}

impl TrackRecord {
    /// Whether the release year has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.year.is_some()
    }

    /// The decade the track belongs to (e.g. 1987 → 1980). `None` while pending.
    pub fn decade(&self) -> Option<i32> {
        self.year.map(|y| (y / 10) * 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: Option<i32>) -> TrackRecord {
        TrackRecord {
            track_id: "3n3Ppam7vgaVa1iaRUc9Lp".to_string(),
            artists: "The Killers".to_string(),
            track_name: "Mr. Brightside".to_string(),
            album_name: "Hot Fuss".to_string(),
            track_genre: "rock".to_string(),
            duration_ms: 222_200.0,
            energy: 0.92,
            valence: 0.23,
            speechiness: 0.08,
            instrumentalness: 0.0,
            year,
        }
    }

    #[test]
    fn test_pending_vs_resolved() {
        assert!(!record(None).is_resolved());
        assert!(record(Some(2004)).is_resolved());
    }

    #[test]
    fn test_decade_rounds_down() {
        assert_eq!(record(Some(2004)).decade(), Some(2000));
        assert_eq!(record(Some(1989)).decade(), Some(1980));
        assert_eq!(record(None).decade(), None);
    }
}
