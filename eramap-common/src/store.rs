//! CSV dataset store
//!
//! Loads and persists the track dataset as a CSV file, one row per
//! `TrackRecord`. Saves go through a temporary sibling file followed by a
//! rename so an interrupted write never replaces a good checkpoint with a
//! truncated one.

use crate::error::Result;
use crate::model::TrackRecord;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load a dataset from a CSV file.
///
/// Accepts both the base input (no `year` column) and checkpoints written by
/// [`save_dataset`] (empty `year` cells deserialize to `None`).
pub fn load_dataset(path: &Path) -> Result<Vec<TrackRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: TrackRecord = row?;
        records.push(record);
    }
    debug!(path = %path.display(), rows = records.len(), "dataset loaded");
    Ok(records)
}

/// Persist a dataset to a CSV file.
///
/// Writes to `<path>.tmp` and renames over the target once the writer has
/// been flushed, so readers only ever observe complete files.
pub fn save_dataset(path: &Path, records: &[TrackRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_sibling(path);
    {
        let mut writer = csv::Writer::from_path(&tmp_path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;

    debug!(path = %path.display(), rows = records.len(), "dataset saved");
    Ok(())
}

fn temp_sibling(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(year: Option<i32>) -> TrackRecord {
        TrackRecord {
            track_id: "id-1".to_string(),
            artists: "Artist".to_string(),
            track_name: "Track".to_string(),
            album_name: "Album".to_string(),
            track_genre: "pop".to_string(),
            duration_ms: 180_000.0,
            energy: 0.5,
            valence: 0.5,
            speechiness: 0.1,
            instrumentalness: 0.0,
            year,
        }
    }

    #[test]
    fn test_round_trip_preserves_year_and_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.csv");

        let records = vec![sample(Some(1999)), sample(None)];
        save_dataset(&path, &records).unwrap();

        let loaded = load_dataset(&path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_load_without_year_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base.csv");
        std::fs::write(
            &path,
            "track_id,artists,track_name,album_name,track_genre,duration_ms,energy,valence,speechiness,instrumentalness\n\
             id-1,Artist,Track,Album,pop,180000.0,0.5,0.5,0.1,0.0\n",
        )
        .unwrap();

        let loaded = load_dataset(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].year, None);
        assert!(!loaded[0].is_resolved());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.csv");

        save_dataset(&path, &[sample(Some(2010))]).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("dataset.csv.tmp").exists());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("out.csv");

        save_dataset(&path, &[sample(None)]).unwrap();
        assert!(path.exists());
    }
}
