//! Lane worker
//!
//! Drains one lane's queue against one catalog source. A worker terminates
//! when its queue yields the stop sentinel, when the queue closes with
//! nothing left, or when the stop signal fires, whichever comes first. A
//! lookup already in flight when the signal fires completes (bounded by the
//! client's own timeout) before the worker observes it and exits.

use super::state::SharedDataset;
use super::Lane;
use crate::sources::{LookupRequest, YearSource};
use eramap_common::events::{EnrichEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// One message on a lane queue. `Stop` is the sentinel: statically distinct
/// from any index, it unblocks a waiting worker and ends its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneMessage {
    Index(usize),
    Stop,
}

/// Per-lane retry behavior for missed lookups.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total lookup attempts per record
    pub attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// One attempt, no retry; the MusicBrainz and Discogs lanes.
    pub const fn single() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

pub struct LaneWorker {
    lane: Lane,
    dataset: Arc<SharedDataset>,
    source: Arc<dyn YearSource>,
    queue: mpsc::UnboundedReceiver<LaneMessage>,
    retry: RetryPolicy,
    events: EventBus,
    run_id: Uuid,
}

impl LaneWorker {
    pub fn new(
        lane: Lane,
        dataset: Arc<SharedDataset>,
        source: Arc<dyn YearSource>,
        queue: mpsc::UnboundedReceiver<LaneMessage>,
        retry: RetryPolicy,
        events: EventBus,
        run_id: Uuid,
    ) -> Self {
        Self {
            lane,
            dataset,
            source,
            queue,
            retry,
            events,
            run_id,
        }
    }

    /// Drain the queue until a stop sentinel, queue close, or cancellation.
    pub async fn run(mut self) {
        let cancel = self.dataset.cancel_token();
        debug!(lane = %self.lane, "lane worker started");

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = self.queue.recv() => message,
            };

            match message {
                Some(LaneMessage::Index(index)) => self.process(index).await,
                Some(LaneMessage::Stop) => {
                    debug!(lane = %self.lane, "stop sentinel received");
                    break;
                }
                // queue closed: nothing more can arrive
                None => break,
            }
        }

        debug!(lane = %self.lane, processed = self.dataset.processed(), "lane worker terminated");
    }

    async fn process(&self, index: usize) {
        // Resuming a prior partial run: the record may already be done.
        if self.dataset.is_resolved(index).await {
            trace!(lane = %self.lane, index, "already resolved, skipping");
            self.finish(index, true);
            return;
        }

        let Some(request) = self.dataset.lookup_request(index).await else {
            warn!(lane = %self.lane, index, "index out of range, skipping");
            return;
        };

        let year = self.resolve_with_retry(&request).await;
        self.dataset.set_year(index, year).await;
        self.finish(index, year.is_some());
    }

    /// Look the record up, retrying per the lane's policy until a year comes
    /// back, the attempts run out, or the stop signal fires. A run of misses
    /// ends with `None` written: terminal for this run, still pending for
    /// the next.
    async fn resolve_with_retry(&self, request: &LookupRequest) -> Option<i32> {
        let cancel = self.dataset.cancel_token();

        let mut year = self.source.lookup_year(request).await;
        let mut attempt = 1;

        while year.is_none() && attempt < self.retry.attempts && !cancel.is_cancelled() {
            trace!(
                lane = %self.lane,
                track = %request.track_name,
                attempt,
                "lookup missed, retrying after delay"
            );
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.retry.delay) => {}
            }
            year = self.source.lookup_year(request).await;
            attempt += 1;
        }

        year
    }

    fn finish(&self, index: usize, resolved: bool) {
        self.dataset.mark_processed();
        self.events.emit(EnrichEvent::RecordProcessed {
            run_id: self.run_id,
            lane: self.lane,
            index,
            resolved,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use eramap_common::TrackRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted source: counts calls, returns a fixed answer.
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

    fn worker_for(
        dataset: &Arc<SharedDataset>,
        source: Arc<dyn YearSource>,
        retry: RetryPolicy,
    ) -> (mpsc::UnboundedSender<LaneMessage>, LaneWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = LaneWorker::new(
            Lane::Spotify,
            Arc::clone(dataset),
            source,
            rx,
            retry,
            EventBus::new(64),
            Uuid::new_v4(),
        );
        (tx, worker)
    }

    #[tokio::test]
    async fn test_resolves_and_stops_on_sentinel() {
        let dataset = Arc::new(SharedDataset::new(records(&[None, None])));
        let source = FixedSource::new(Some(1988));
        let (tx, worker) = worker_for(&dataset, source.clone(), RetryPolicy::single());

        tx.send(LaneMessage::Index(0)).unwrap();
        tx.send(LaneMessage::Index(1)).unwrap();
        tx.send(LaneMessage::Stop).unwrap();

        worker.run().await;

        let snapshot = dataset.snapshot().await;
        assert_eq!(snapshot[0].year, Some(1988));
        assert_eq!(snapshot[1].year, Some(1988));
        assert_eq!(dataset.processed(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_five_misses_record_unknown_and_advance() {
        let dataset = Arc::new(SharedDataset::new(records(&[None])));
        let source = FixedSource::new(None);
        let retry = RetryPolicy {
            attempts: 5,
            delay: Duration::ZERO,
        };
        let (tx, worker) = worker_for(&dataset, source.clone(), retry);

        tx.send(LaneMessage::Index(0)).unwrap();
        tx.send(LaneMessage::Stop).unwrap();

        worker.run().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
        assert_eq!(dataset.snapshot().await[0].year, None);
        // the miss still advances progress; the lane is not blocked
        assert_eq!(dataset.processed(), 1);
    }

    #[tokio::test]
    async fn test_resolved_record_skipped_without_lookup() {
        let dataset = Arc::new(SharedDataset::new(records(&[Some(2001)])));
        let source = FixedSource::new(Some(1900));
        let (tx, worker) = worker_for(&dataset, source.clone(), RetryPolicy::single());

        tx.send(LaneMessage::Index(0)).unwrap();
        tx.send(LaneMessage::Stop).unwrap();

        worker.run().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(dataset.snapshot().await[0].year, Some(2001));
        assert_eq!(dataset.processed(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_empty_queue_wait() {
        let dataset = Arc::new(SharedDataset::new(records(&[None])));
        let source = FixedSource::new(Some(1970));
        let (tx, worker) = worker_for(&dataset, source, RetryPolicy::single());

        let cancel = dataset.cancel_token();
        let handle = tokio::spawn(worker.run());

        // worker is parked on an empty queue; the signal must free it
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not exit after cancellation")
            .unwrap();
        drop(tx);
    }

    #[tokio::test]
    async fn test_queue_close_terminates_worker() {
        let dataset = Arc::new(SharedDataset::new(records(&[None])));
        let source = FixedSource::new(Some(1970));
        let (tx, worker) = worker_for(&dataset, source, RetryPolicy::single());

        tx.send(LaneMessage::Index(0)).unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), worker.run())
            .await
            .expect("worker did not exit after queue close");
        assert_eq!(dataset.snapshot().await[0].year, Some(1970));
    }
}
