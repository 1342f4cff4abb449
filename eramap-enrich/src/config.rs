//! Credential resolution for the catalog clients
//!
//! Priority: environment variable → TOML config. Credentials found in both
//! places log a warning and the environment wins. A service with no usable
//! credentials is a fatal startup error; the engine never runs with a lane
//! that cannot authenticate.

use eramap_common::config::TomlConfig;
use eramap_common::{Error, Result};
use tracing::{info, warn};

/// Resolved Spotify client-credentials pair
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

const ENV_SPOTIFY_CLIENT_ID: &str = "ERAMAP_SPOTIFY_CLIENT_ID";
const ENV_SPOTIFY_CLIENT_SECRET: &str = "ERAMAP_SPOTIFY_CLIENT_SECRET";
const ENV_DISCOGS_TOKEN: &str = "ERAMAP_DISCOGS_TOKEN";

/// Resolve Spotify credentials from ENV → TOML.
pub fn resolve_spotify_credentials(config: &TomlConfig) -> Result<SpotifyCredentials> {
    let client_id = resolve_value(
        "Spotify client id",
        ENV_SPOTIFY_CLIENT_ID,
        config.spotify.client_id.as_deref(),
    )?;
    let client_secret = resolve_value(
        "Spotify client secret",
        ENV_SPOTIFY_CLIENT_SECRET,
        config.spotify.client_secret.as_deref(),
    )?;
    Ok(SpotifyCredentials {
        client_id,
        client_secret,
    })
}

/// Resolve the Discogs personal access token from ENV → TOML.
pub fn resolve_discogs_token(config: &TomlConfig) -> Result<String> {
    resolve_value("Discogs token", ENV_DISCOGS_TOKEN, config.discogs.token.as_deref())
}

fn resolve_value(what: &str, env_var: &str, toml_value: Option<&str>) -> Result<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid(v));
    let toml_value = toml_value.filter(|v| is_valid(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both {} and TOML config; using environment (highest priority)",
            what, env_var
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", what);
        return Ok(value);
    }
    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", what);
        return Ok(value.to_string());
    }

    Err(Error::Config(format!(
        "{} not configured. Set {} or add it to the TOML config file",
        what, env_var
    )))
}

/// Validate a credential value (non-empty, non-whitespace)
fn is_valid(value: &str) -> bool {
    !value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eramap_common::config::TomlConfig;

    fn config_with(token: Option<&str>) -> TomlConfig {
        let mut config = TomlConfig::default();
        config.discogs.token = token.map(|s| s.to_string());
        config
    }

    #[test]
    fn test_toml_value_used_when_env_unset() {
        // env var name unique to this test to avoid cross-test interference
        let result = resolve_value(
            "Discogs token",
            "ERAMAP_TEST_UNSET_VAR",
            Some("toml-token"),
        )
        .unwrap();
        assert_eq!(result, "toml-token");
    }

    #[test]
    fn test_env_beats_toml() {
        std::env::set_var("ERAMAP_TEST_ENV_WINS", "env-token");
        let result =
            resolve_value("Discogs token", "ERAMAP_TEST_ENV_WINS", Some("toml-token")).unwrap();
        std::env::remove_var("ERAMAP_TEST_ENV_WINS");
        assert_eq!(result, "env-token");
    }

    #[test]
    fn test_missing_everywhere_is_fatal() {
        let config = config_with(None);
        let result = resolve_discogs_token(&config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_whitespace_value_rejected() {
        let config = config_with(Some("   "));
        assert!(resolve_discogs_token(&config).is_err());
    }
}
