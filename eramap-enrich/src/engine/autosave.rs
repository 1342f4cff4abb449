//! Autosave supervisor
//!
//! Checkpoints the shared dataset on a fixed interval while enough new
//! records have resolved since the last save. Every save is guarded: a row
//! count that no longer matches the count captured at startup cancels the
//! run instead of writing. The supervisor never performs a final save; that
//! is the coordinator's job after all workers have stopped.

use super::state::SharedDataset;
use eramap_common::events::{EnrichEvent, EventBus};
use eramap_common::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct AutosaveSupervisor {
    dataset: Arc<SharedDataset>,
    path: PathBuf,
    interval: Duration,
    /// Newly-resolved records required since the last save before writing again
    threshold: usize,
    events: EventBus,
    run_id: Uuid,
}

impl AutosaveSupervisor {
    pub fn new(
        dataset: Arc<SharedDataset>,
        path: PathBuf,
        interval: Duration,
        threshold: usize,
        events: EventBus,
        run_id: Uuid,
    ) -> Self {
        Self {
            dataset,
            path,
            interval,
            threshold,
            events,
            run_id,
        }
    }

    /// Poll until the stop signal fires. Exits silently on cancellation; on a
    /// corruption abort the guard has already cancelled the token, so the
    /// workers unwind on their own.
    pub async fn run(self) {
        let cancel = self.dataset.cancel_token();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_saved = 0usize;
        debug!(path = %self.path.display(), interval_secs = self.interval.as_secs(), "autosave supervisor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let resolved = self.dataset.resolved_count().await;
            if resolved <= last_saved + self.threshold {
                continue;
            }

            match self.dataset.save_if_safe(&self.path).await {
                Ok(()) => {
                    info!(resolved, path = %self.path.display(), "autosaved checkpoint");
                    self.events.emit(EnrichEvent::Autosaved {
                        run_id: self.run_id,
                        resolved,
                        path: self.path.display().to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    last_saved = resolved;
                }
                Err(Error::Corruption { expected, actual }) => {
                    error!(expected, actual, "autosave aborted on corrupted dataset");
                    self.events.emit(EnrichEvent::CorruptionDetected {
                        run_id: self.run_id,
                        expected,
                        actual,
                    });
                    break;
                }
                Err(e) => {
                    // transient I/O failure: last_saved stays put so the next
                    // tick retries the same save
                    warn!(error = %e, "autosave failed, will retry next tick");
                }
            }
        }

        debug!("autosave supervisor terminated");
    }
}
