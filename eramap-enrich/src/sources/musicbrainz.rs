//! MusicBrainz catalog client
//!
//! Searches recordings by artist, track, and release title, then walks the
//! matched recordings' releases for the first usable date. Falls back to
//! release-event dates when a release has no top-level date, matching how
//! incomplete entries are commonly filled in on MusicBrainz.
//!
//! # API Reference
//! - Endpoint: https://musicbrainz.org/ws/2/recording
//! - Rate limit: 1 request/second (MusicBrainz Terms of Service)
//! - A descriptive User-Agent with contact information is mandatory

use super::{parse_year, LookupRequest, YearSource};
use async_trait::async_trait;
use eramap_common::{Error, Result};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

const API_BASE_URL: &str = "https://musicbrainz.org/ws/2";

/// Matched recordings fetched per search
const SEARCH_LIMIT: u32 = 3;

/// MusicBrainz Web Service client, rate limited to 1 request/second.
pub struct MusicBrainzClient {
    client: Client,
    user_agent: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    recordings: Vec<Recording>,
}

#[derive(Debug, Deserialize)]
struct Recording {
    #[serde(default)]
    releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    date: Option<String>,
    #[serde(rename = "release-events", default)]
    release_events: Vec<ReleaseEvent>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEvent {
    date: Option<String>,
}

impl MusicBrainzClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `user_agent` - "AppName/Version ( contact )" per MusicBrainz policy
    /// * `timeout` - per-request HTTP timeout
    pub fn new(user_agent: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        let rate_limiter = RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(1).expect("1 is non-zero"),
        ));

        Ok(Self {
            client,
            user_agent,
            rate_limiter,
        })
    }

    async fn search(&self, req: &LookupRequest) -> Option<SearchResponse> {
        self.rate_limiter.until_ready().await;

        let query = format!(
            "recording:\"{}\" AND artist:\"{}\" AND release:\"{}\"",
            escape_lucene(&req.track_name),
            escape_lucene(&req.artists),
            escape_lucene(&req.album_name),
        );

        let url = format!("{}/recording", API_BASE_URL);
        let limit = SEARCH_LIMIT.to_string();
        let response = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .query(&[
                ("query", query.as_str()),
                ("limit", limit.as_str()),
                ("fmt", "json"),
            ])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                debug!(track = %req.track_name, error = %e, "MusicBrainz request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(track = %req.track_name, %status, "MusicBrainz request rejected");
            return None;
        }

        match response.json().await {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(track = %req.track_name, error = %e, "failed to parse MusicBrainz response");
                None
            }
        }
    }
}

/// First usable year across the matched recordings, scanning release dates
/// then release-event dates, in result order.
fn first_release_year(response: &SearchResponse) -> Option<i32> {
    for recording in &response.recordings {
        for release in &recording.releases {
            if let Some(year) = release.date.as_deref().and_then(parse_year) {
                return Some(year);
            }
            for event in &release.release_events {
                if let Some(year) = event.date.as_deref().and_then(parse_year) {
                    return Some(year);
                }
            }
        }
    }
    None
}

/// Escape characters with meaning in Lucene query syntax.
fn escape_lucene(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(
            c,
            '+' | '-' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~'
                | '*' | '?' | ':' | '\\' | '/'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl YearSource for MusicBrainzClient {
    fn name(&self) -> &'static str {
        "MusicBrainz"
    }

    async fn lookup_year(&self, req: &LookupRequest) -> Option<i32> {
        let year = match self.search(req).await {
            Some(response) => first_release_year(&response),
            None => None,
        };
        debug!(track = %req.track_name, artists = %req.artists, ?year, "MusicBrainz lookup complete");
        year
    }
}
