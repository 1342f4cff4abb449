//! Discogs catalog client
//!
//! Searches releases by artist, track, and release title using a personal
//! access token. Discogs enforces a per-minute request window advertised in
//! response headers; the client tracks the remaining allowance and sleeps
//! out the window when it is nearly exhausted, alongside a coarse 1
//! request/second quota.
//!
//! # API Reference
//! - Endpoint: https://api.discogs.com/database/search
//! - Headers: X-Discogs-Ratelimit, X-Discogs-Ratelimit-Remaining

use super::{LookupRequest, YearSource};
use async_trait::async_trait;
use eramap_common::{Error, Result};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const API_BASE_URL: &str = "https://api.discogs.com";
const USER_AGENT: &str = "eramap/0.1.0";

/// Results fetched per search
const PER_PAGE: u32 = 5;

/// The Discogs allowance window length
const WINDOW: Duration = Duration::from_secs(60);

/// Discogs database-search client.
pub struct DiscogsClient {
    client: Client,
    token: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    window: Mutex<WindowState>,
}

/// Remaining allowance in the current per-minute window, from response headers.
struct WindowState {
    resets_at: Instant,
    remaining: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    /// Discogs reports the year inconsistently as a string or a number
    year: Option<YearField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YearField {
    Number(i64),
    Text(String),
}

impl YearField {
    fn as_year(&self) -> Option<i32> {
        let year = match self {
            YearField::Number(n) => i32::try_from(*n).ok()?,
            YearField::Text(s) => s.trim().parse::<i32>().ok()?,
        };
        (year > 0).then_some(year)
    }
}

impl DiscogsClient {
    pub fn new(token: String, timeout: Duration) -> Result<Self> {
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
            token,
            rate_limiter,
            window: Mutex::new(WindowState {
                resets_at: Instant::now() + WINDOW,
                remaining: u32::MAX,
            }),
        })
    }

    /// Sleep out the advertised window when the allowance is nearly spent.
    async fn respect_window(&self) {
        let mut window = self.window.lock().await;
        let now = Instant::now();

        if now >= window.resets_at {
            window.resets_at = now + WINDOW;
            window.remaining = u32::MAX;
            return;
        }

        if window.remaining <= 1 {
            let wait = window.resets_at - now;
            debug!(wait_ms = wait.as_millis() as u64, "Discogs allowance exhausted, waiting for window reset");
            tokio::time::sleep(wait).await;
            window.resets_at = Instant::now() + WINDOW;
            window.remaining = u32::MAX;
        }
    }

    /// Record the allowance advertised by a response.
    async fn observe_headers(&self, response: &reqwest::Response) {
        let remaining = response
            .headers()
            .get("X-Discogs-Ratelimit-Remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());

        if let Some(remaining) = remaining {
            let mut window = self.window.lock().await;
            window.remaining = remaining;
        }
    }

    async fn search(&self, req: &LookupRequest) -> Option<SearchResponse> {
        self.respect_window().await;
        self.rate_limiter.until_ready().await;

        let url = format!("{}/database/search", API_BASE_URL);
        let per_page = PER_PAGE.to_string();
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Discogs token={}", self.token))
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("artist", req.artists.as_str()),
                ("track", req.track_name.as_str()),
                ("release_title", req.album_name.as_str()),
                ("type", "release"),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                debug!(track = %req.track_name, error = %e, "Discogs request failed");
                return None;
            }
        };

        self.observe_headers(&response).await;

        let status = response.status();
        if !status.is_success() {
            debug!(track = %req.track_name, %status, "Discogs request rejected");
            return None;
        }

        match response.json().await {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(track = %req.track_name, error = %e, "failed to parse Discogs response");
                None
            }
        }
    }
}

/// First result carrying a parseable, non-zero year.
fn first_result_year(response: &SearchResponse) -> Option<i32> {
    response
        .results
        .iter()
        .filter_map(|r| r.year.as_ref())
        .find_map(YearField::as_year)
}

#[async_trait]
impl YearSource for DiscogsClient {
    fn name(&self) -> &'static str {
        "Discogs"
    }

    async fn lookup_year(&self, req: &LookupRequest) -> Option<i32> {
        let year = match self.search(req).await {
            Some(response) => first_result_year(&response),
            None => None,
        };
        debug!(track = %req.track_name, artists = %req.artists, ?year, "Discogs lookup complete");
        year
    }
}
