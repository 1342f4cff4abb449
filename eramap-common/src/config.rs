//! Configuration loading
//!
//! TOML configuration shared by the eramap binaries. Resolution order for
//! the file itself: explicit `--config` path, then the platform config
//! directory (`<config_dir>/eramap/eramap.toml`), then compiled defaults.
//! Credential values may additionally be overridden from the environment;
//! that resolution lives with the enrichment binary.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub discogs: DiscogsConfig,
    #[serde(default)]
    pub musicbrainz: MusicBrainzConfig,
    #[serde(default)]
    pub enrich: EnrichParams,
}

/// Dataset file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Base input dataset (no year column yet)
    pub base_dataset: PathBuf,
    /// Resumable checkpoint written by autosave and on cancellation
    pub checkpoint: PathBuf,
    /// Final output, written only on normal completion
    pub final_output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dataset: PathBuf::from("data/filtered_dataset.csv"),
            checkpoint: PathBuf::from("data/completed_dataset.csv"),
            final_output: PathBuf::from("data/completed_dataset_final.csv"),
        }
    }
}

/// Spotify API credentials (client-credentials flow)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Discogs API personal access token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscogsConfig {
    pub token: Option<String>,
}

/// MusicBrainz contact information, required in the User-Agent by their TOS
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicBrainzConfig {
    pub contact: String,
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            contact: "eramap/0.1.0 (https://github.com/eramap/eramap)".to_string(),
        }
    }
}

/// Enrichment engine tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichParams {
    /// Autosave supervisor polling interval, seconds
    pub autosave_interval_secs: u64,
    /// Newly-resolved record count that triggers an autosave
    pub autosave_threshold: usize,
    /// Lookup attempts on the Spotify lane before recording an unknown year
    pub spotify_retry_attempts: u32,
    /// Fixed delay between Spotify lane attempts, seconds
    pub spotify_retry_delay_secs: u64,
    /// Per-request HTTP timeout for all catalog clients, seconds
    pub lookup_timeout_secs: u64,
}

impl Default for EnrichParams {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 10,
            autosave_threshold: 50,
            spotify_retry_attempts: 5,
            spotify_retry_delay_secs: 2,
            lookup_timeout_secs: 15,
        }
    }
}

/// Default configuration file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("eramap").join("eramap.toml"))
}

/// Load configuration.
///
/// An explicitly given path must exist and parse; a missing default-location
/// file silently falls back to compiled defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let (path, required) = match explicit {
        Some(p) => (Some(p.to_path_buf()), true),
        None => (default_config_path(), false),
    };

    let Some(path) = path else {
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        if required {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("parse {} failed: {}", path.display(), e)))?;

    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}
