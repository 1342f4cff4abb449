//! Catalog lookup sources
//!
//! Each external catalog is wrapped in a [`YearSource`]: given a track
//! descriptor, return its release year or nothing. Sources never error:
//! network failures, rate limits, and misses all collapse to `None` inside
//! the client, so nothing a service does can crash a lane worker. Every call
//! returns within the client's request timeout.

use async_trait::async_trait;
use eramap_common::TrackRecord;

pub mod discogs;
pub mod musicbrainz;
pub mod spotify;

pub use discogs::DiscogsClient;
pub use musicbrainz::MusicBrainzClient;
pub use spotify::SpotifyClient;

/// The fields a catalog lookup may use to identify a track.
#[derive(Debug, Clone)]
pub struct LookupRequest {
    pub track_id: String,
    pub artists: String,
    pub track_name: String,
    pub album_name: String,
}

impl LookupRequest {
    pub fn from_record(record: &TrackRecord) -> Self {
        Self {
            track_id: record.track_id.clone(),
            artists: record.artists.clone(),
            track_name: record.track_name.clone(),
            album_name: record.album_name.clone(),
        }
    }
}

/// A release-year lookup capability backed by one external catalog.
#[async_trait]
pub trait YearSource: Send + Sync {
    /// Service name, for logs and events.
    fn name(&self) -> &'static str;

    /// Resolve the release year for a track, or `None` when the service
    /// cannot (not found, malformed response, network failure). Must not
    /// panic and must return within a bounded time.
    async fn lookup_year(&self, req: &LookupRequest) -> Option<i32>;
}

/// Parse the leading year out of a catalog date string.
///
/// Catalogs report dates as `YYYY`, `YYYY-MM`, or `YYYY-MM-DD`; some report
/// a literal `0` for unknown, which is treated as absent.
pub(crate) fn parse_year(date: &str) -> Option<i32> {
    let year = date.split('-').next()?.trim().parse::<i32>().ok()?;
    (year > 0).then_some(year)
}
