//! Spotify catalog client
//!
//! Authenticates with the client-credentials flow (no user context needed
//! for track metadata), caches the bearer token until shortly before expiry,
//! and resolves a track's release year from its album release date.
//!
//! # API Reference
//! - Token: https://accounts.spotify.com/api/token
//! - Track: https://api.spotify.com/v1/tracks/{id}

use super::{parse_year, LookupRequest, YearSource};
use crate::config::SpotifyCredentials;
use async_trait::async_trait;
use eramap_common::{Error, Result};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Refresh the token this long before the server-reported expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Spotify Web API client
///
/// Rate limited to 2 requests/second; Spotify's own 429 handling is a
/// rolling window, so a conservative fixed quota keeps the client out of
/// backoff territory entirely.
pub struct SpotifyClient {
    client: Client,
    credentials: SpotifyCredentials,
    token: Mutex<Option<CachedToken>>,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    album: AlbumInfo,
}

#[derive(Debug, Deserialize)]
struct AlbumInfo {
    release_date: Option<String>,
}

impl SpotifyClient {
    /// Create a new client. Fails only on HTTP client construction.
    pub fn new(credentials: SpotifyCredentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        let rate_limiter = RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(2).expect("2 is non-zero"),
        ));

        Ok(Self {
            client,
            credentials,
            token: Mutex::new(None),
            rate_limiter,
        })
    }

    /// Return a valid bearer token, requesting a fresh one when the cached
    /// token is absent or near expiry.
    async fn access_token(&self) -> Option<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Some(token.access_token.clone());
            }
        }

        match self.request_token().await {
            Ok(token) => {
                let access_token = token.access_token.clone();
                *cached = Some(token);
                Some(access_token)
            }
            Err(e) => {
                warn!(error = %e, "Spotify token request failed");
                None
            }
        }
    }

    async fn request_token(&self) -> std::result::Result<CachedToken, reqwest::Error> {
        let response: TokenResponse = self
            .client
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let lifetime = Duration::from_secs(response.expires_in)
            .saturating_sub(TOKEN_EXPIRY_MARGIN);

        Ok(CachedToken {
            access_token: response.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }

    async fn fetch_year(&self, track_id: &str) -> Option<i32> {
        let token = self.access_token().await?;

        self.rate_limiter.until_ready().await;

        let url = format!("{}/tracks/{}", API_BASE_URL, track_id);
        let response = match self.client.get(&url).bearer_auth(token).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(track_id, error = %e, "Spotify track request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(track_id, %status, "Spotify track request rejected");
            return None;
        }

        let track: TrackResponse = match response.json().await {
            Ok(track) => track,
            Err(e) => {
                debug!(track_id, error = %e, "failed to parse Spotify track response");
                return None;
            }
        };

        track.album.release_date.as_deref().and_then(parse_year)
    }
}

#[async_trait]
impl YearSource for SpotifyClient {
    fn name(&self) -> &'static str {
        "Spotify"
    }

    async fn lookup_year(&self, req: &LookupRequest) -> Option<i32> {
        if req.track_id.is_empty() {
            return None;
        }
        let year = self.fetch_year(&req.track_id).await;
        debug!(track_id = %req.track_id, ?year, "Spotify lookup complete");
        year
    }
}
