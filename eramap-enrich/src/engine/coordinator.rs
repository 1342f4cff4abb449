//! Enrichment coordinator
//!
//! Owns the shared dataset and the stop signal for one run. Startup:
//! partition pending work, feed the three lane queues (each capped with a
//! stop sentinel so workers terminate when their queue drains), spawn the
//! autosave supervisor and the three lane workers. Shutdown has two shapes:
//!
//! - **Normal**: every worker drains its queue and exits → set the stop
//!   signal, join the supervisor, guarded persist to the final path.
//! - **Cancelled**: the stop signal fires externally (Ctrl-C) or from the
//!   corruption guard → push an extra sentinel into each lane so nobody
//!   stays parked on an empty queue, join everything, one guarded persist
//!   to the resumable checkpoint.
//!
//! A corruption abort surfaces as `Error::Corruption` from the final
//! guarded persist; nothing is written past the guard.

use super::autosave::AutosaveSupervisor;
use super::partition::partition_pending;
use super::state::SharedDataset;
use super::worker::{LaneMessage, LaneWorker, RetryPolicy};
use super::Lane;
use crate::config::{resolve_discogs_token, resolve_spotify_credentials};
use crate::sources::{DiscogsClient, MusicBrainzClient, SpotifyClient, YearSource};
use eramap_common::config::{EnrichParams, TomlConfig};
use eramap_common::events::{EnrichEvent, EventBus};
use eramap_common::{Result, TrackRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

/// One catalog client per lane.
pub struct LaneSources {
    pub spotify: Arc<dyn YearSource>,
    pub musicbrainz: Arc<dyn YearSource>,
    pub discogs: Arc<dyn YearSource>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All lanes drained naturally
    Completed,
    /// The stop signal fired before the lanes drained
    Cancelled,
}

/// What a run accomplished and where the result went.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub resolved: usize,
    pub unresolved: usize,
    pub saved_to: PathBuf,
}

pub struct Enricher {
    dataset: Arc<SharedDataset>,
    sources: LaneSources,
    params: EnrichParams,
    events: EventBus,
    run_id: Uuid,
}

impl Enricher {
    pub fn new(
        records: Vec<TrackRecord>,
        sources: LaneSources,
        params: EnrichParams,
        events: EventBus,
    ) -> Self {
        Self {
            dataset: Arc::new(SharedDataset::new(records)),
            sources,
            params,
            events,
            run_id: Uuid::new_v4(),
        }
    }

    /// Build an enricher with the three real catalog clients. Missing
    /// credentials or a failed HTTP-client build are fatal here: the run
    /// never starts with a lane that cannot authenticate.
    pub fn from_config(
        records: Vec<TrackRecord>,
        config: &TomlConfig,
        events: EventBus,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(config.enrich.lookup_timeout_secs);

        let spotify = SpotifyClient::new(resolve_spotify_credentials(config)?, timeout)?;
        let musicbrainz = MusicBrainzClient::new(config.musicbrainz.contact.clone(), timeout)?;
        let discogs = DiscogsClient::new(resolve_discogs_token(config)?, timeout)?;

        Ok(Self::new(
            records,
            LaneSources {
                spotify: Arc::new(spotify),
                musicbrainz: Arc::new(musicbrainz),
                discogs: Arc::new(discogs),
            },
            config.enrich.clone(),
            events,
        ))
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The run's stop signal, for external cancellation (Ctrl-C handler).
    pub fn cancel_token(&self) -> tokio_util::sync::CancellationToken {
        self.dataset.cancel_token()
    }

    /// Execute one enrichment run.
    pub async fn run(&self, checkpoint: &Path, final_path: &Path) -> Result<RunReport> {
        let cancel = self.dataset.cancel_token();

        let records = self.dataset.snapshot().await;
        let partition = partition_pending(&records);
        drop(records);

        let total_pending = partition.total_pending();
        info!(
            run_id = %self.run_id,
            total_records = self.dataset.expected_len(),
            total_pending,
            spotify = partition.spotify.len(),
            musicbrainz = partition.musicbrainz.len(),
            discogs = partition.discogs.len(),
            "starting enrichment run"
        );
        self.events.emit(EnrichEvent::RunStarted {
            run_id: self.run_id,
            total_records: self.dataset.expected_len(),
            total_pending,
            timestamp: chrono::Utc::now(),
        });

        // Fill each lane queue up front and cap it with a sentinel, so a
        // worker that drains its queue terminates instead of polling forever.
        let (spotify_tx, spotify_rx) = mpsc::unbounded_channel();
        let (musicbrainz_tx, musicbrainz_rx) = mpsc::unbounded_channel();
        let (discogs_tx, discogs_rx) = mpsc::unbounded_channel();

        for (lane, tx) in [
            (Lane::Spotify, &spotify_tx),
            (Lane::MusicBrainz, &musicbrainz_tx),
            (Lane::Discogs, &discogs_tx),
        ] {
            for &index in partition.lane(lane) {
                let _ = tx.send(LaneMessage::Index(index));
            }
            let _ = tx.send(LaneMessage::Stop);
        }

        let spotify_retry = RetryPolicy {
            attempts: self.params.spotify_retry_attempts,
            delay: Duration::from_secs(self.params.spotify_retry_delay_secs),
        };

        let mut workers = JoinSet::new();
        workers.spawn(
            LaneWorker::new(
                Lane::Spotify,
                Arc::clone(&self.dataset),
                Arc::clone(&self.sources.spotify),
                spotify_rx,
                spotify_retry,
                self.events.clone(),
                self.run_id,
            )
            .run(),
        );
        workers.spawn(
            LaneWorker::new(
                Lane::MusicBrainz,
                Arc::clone(&self.dataset),
                Arc::clone(&self.sources.musicbrainz),
                musicbrainz_rx,
                RetryPolicy::single(),
                self.events.clone(),
                self.run_id,
            )
            .run(),
        );
        workers.spawn(
            LaneWorker::new(
                Lane::Discogs,
                Arc::clone(&self.dataset),
                Arc::clone(&self.sources.discogs),
                discogs_rx,
                RetryPolicy::single(),
                self.events.clone(),
                self.run_id,
            )
            .run(),
        );

        let autosave = tokio::spawn(
            AutosaveSupervisor::new(
                Arc::clone(&self.dataset),
                checkpoint.to_path_buf(),
                Duration::from_secs(self.params.autosave_interval_secs),
                self.params.autosave_threshold,
                self.events.clone(),
                self.run_id,
            )
            .run(),
        );

        // Monitor: either every lane drains naturally, or the stop signal
        // fires first (Ctrl-C from outside, or the corruption guard).
        let cancelled = tokio::select! {
            _ = async { while workers.join_next().await.is_some() {} } => cancel.is_cancelled(),
            _ = cancel.cancelled() => true,
        };

        if cancelled {
            info!(run_id = %self.run_id, "stop signal observed; draining lane workers");
            self.events.emit(EnrichEvent::Cancelled {
                run_id: self.run_id,
                timestamp: chrono::Utc::now(),
            });
            // An extra sentinel per lane guarantees nobody stays parked on
            // an empty queue between the signal and the join.
            let _ = spotify_tx.send(LaneMessage::Stop);
            let _ = musicbrainz_tx.send(LaneMessage::Stop);
            let _ = discogs_tx.send(LaneMessage::Stop);
            while workers.join_next().await.is_some() {}
        }

        // Normal completion reaches here with the token still clear; set it
        // so the autosave supervisor winds down. Idempotent otherwise.
        cancel.cancel();
        if let Err(e) = autosave.await {
            warn!(error = %e, "autosave supervisor panicked");
        }

        // The one definitive persist for this run. Cancelled runs go to the
        // resumable checkpoint; completed runs to the final output.
        let (outcome, save_path) = if cancelled {
            (RunOutcome::Cancelled, checkpoint)
        } else {
            (RunOutcome::Completed, final_path)
        };
        self.dataset.save_if_safe(save_path).await?;

        let resolved = self.dataset.resolved_count().await;
        let unresolved = self.dataset.expected_len() - resolved;
        self.events.emit(EnrichEvent::RunCompleted {
            run_id: self.run_id,
            resolved,
            unresolved,
            timestamp: chrono::Utc::now(),
        });
        info!(
            run_id = %self.run_id,
            ?outcome,
            resolved,
            unresolved,
            processed = self.dataset.processed(),
            saved_to = %save_path.display(),
            "enrichment run finished"
        );

        Ok(RunReport {
            outcome,
            resolved,
            unresolved,
            saved_to: save_path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::LookupRequest;
    use async_trait::async_trait;
    use eramap_common::{store, Error};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedSource {
        year: Option<i32>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(year: Option<i32>) -> Arc<Self> {
            Arc::new(Self {
                year,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl YearSource for FixedSource {
        fn name(&self) -> &'static str {
            "Fixed"
        }

        async fn lookup_year(&self, _req: &LookupRequest) -> Option<i32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.year
        }
    }

    /// Slow source: each lookup outlives the cancellation point but still
    /// completes, the way a real client's timeout bounds an in-flight call.
    struct SlowSource;

    #[async_trait]
    impl YearSource for SlowSource {
        fn name(&self) -> &'static str {
            "Slow"
        }

        async fn lookup_year(&self, _req: &LookupRequest) -> Option<i32> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            None
        }
    }

    fn records(years: &[Option<i32>]) -> Vec<TrackRecord> {
        years
            .iter()
            .enumerate()
            .map(|(i, year)| TrackRecord {
                track_id: format!("id-{}", i),
                artists: "Artist".to_string(),
                track_name: format!("Track {}", i),
                album_name: "Album".to_string(),
                track_genre: String::new(),
                duration_ms: 0.0,
                energy: 0.0,
                valence: 0.0,
                speechiness: 0.0,
                instrumentalness: 0.0,
                year: *year,
            })
            .collect()
    }

    fn fast_params() -> EnrichParams {
        EnrichParams {
            autosave_interval_secs: 3600,
            autosave_threshold: 50,
            spotify_retry_attempts: 2,
            spotify_retry_delay_secs: 0,
            lookup_timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_normal_completion_resolves_all_lanes() {
        let dir = TempDir::new().unwrap();
        let checkpoint = dir.path().join("checkpoint.csv");
        let final_path = dir.path().join("final.csv");

        let spotify = FixedSource::new(Some(1980));
        let musicbrainz = FixedSource::new(Some(1990));
        let discogs = FixedSource::new(Some(2000));

        let enricher = Enricher::new(
            records(&[None; 9]),
            LaneSources {
                spotify: spotify.clone(),
                musicbrainz: musicbrainz.clone(),
                discogs: discogs.clone(),
            },
            fast_params(),
            EventBus::new(64),
        );

        let report = enricher.run(&checkpoint, &final_path).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.resolved, 9);
        assert_eq!(report.unresolved, 0);
        assert_eq!(report.saved_to, final_path);
        assert!(final_path.exists());
        assert!(!checkpoint.exists());

        // each lane answered exactly its own partition
        assert_eq!(spotify.calls.load(Ordering::SeqCst), 3);
        assert_eq!(musicbrainz.calls.load(Ordering::SeqCst), 3);
        assert_eq!(discogs.calls.load(Ordering::SeqCst), 3);

        let saved = store::load_dataset(&final_path).unwrap();
        assert_eq!(saved[0].year, Some(1980)); // lane Spotify owns index 0
        assert_eq!(saved[2].year, Some(1990)); // lane MusicBrainz owns index 2
        assert_eq!(saved[1].year, Some(2000)); // lane Discogs owns index 1
    }

    #[tokio::test]
    async fn test_fully_resolved_dataset_issues_no_lookups() {
        let dir = TempDir::new().unwrap();
        let checkpoint = dir.path().join("checkpoint.csv");
        let final_path = dir.path().join("final.csv");

        let spotify = FixedSource::new(Some(1900));
        let musicbrainz = FixedSource::new(Some(1900));
        let discogs = FixedSource::new(Some(1900));

        let enricher = Enricher::new(
            records(&[Some(1999); 12]),
            LaneSources {
                spotify: spotify.clone(),
                musicbrainz: musicbrainz.clone(),
                discogs: discogs.clone(),
            },
            fast_params(),
            EventBus::new(64),
        );

        let report = enricher.run(&checkpoint, &final_path).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.resolved, 12);
        assert_eq!(spotify.calls.load(Ordering::SeqCst), 0);
        assert_eq!(musicbrainz.calls.load(Ordering::SeqCst), 0);
        assert_eq!(discogs.calls.load(Ordering::SeqCst), 0);
        assert!(final_path.exists());
    }

    #[tokio::test]
    async fn test_cancellation_checkpoints_partial_progress() {
        let dir = TempDir::new().unwrap();
        let checkpoint = dir.path().join("checkpoint.csv");
        let final_path = dir.path().join("final.csv");

        let enricher = Enricher::new(
            records(&[None; 9]),
            LaneSources {
                spotify: Arc::new(SlowSource),
                musicbrainz: Arc::new(SlowSource),
                discogs: Arc::new(SlowSource),
            },
            fast_params(),
            EventBus::new(64),
        );

        let cancel = enricher.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            enricher.run(&checkpoint, &final_path),
        )
        .await
        .expect("cancellation did not unwind the run")
        .unwrap();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.saved_to, checkpoint);
        assert!(checkpoint.exists());
        assert!(!final_path.exists());
    }

    #[tokio::test]
    async fn test_corrupted_dataset_aborts_final_persist() {
        let dir = TempDir::new().unwrap();
        let checkpoint = dir.path().join("checkpoint.csv");
        let final_path = dir.path().join("final.csv");

        let enricher = Enricher::new(
            records(&[None; 3]),
            LaneSources {
                spotify: FixedSource::new(Some(1980)),
                musicbrainz: FixedSource::new(Some(1990)),
                discogs: FixedSource::new(Some(2000)),
            },
            fast_params(),
            EventBus::new(64),
        );

        // a row appended from outside before the run persists
        enricher
            .dataset
            .records_mut()
            .await
            .push(records(&[None]).pop().unwrap());

        let result = enricher.run(&checkpoint, &final_path).await;
        assert!(matches!(result, Err(Error::Corruption { .. })));
        assert!(!final_path.exists());
        assert!(!checkpoint.exists());
    }
}
