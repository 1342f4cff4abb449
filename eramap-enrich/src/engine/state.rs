//! Shared dataset state
//!
//! One `SharedDataset` is owned by the coordinator for the run's lifetime and
//! shared by `Arc` with the lane workers and the autosave supervisor. Writes
//! go through a single coarse `RwLock` held briefly per record; that is never
//! the bottleneck because writes are rare next to the network latency either
//! side of them. The partition invariant (each index owned by exactly one
//! lane) means two workers never race on the same record.
//!
//! The row count captured at construction is the structural safety reference:
//! a persist that observes a different length cancels the run instead of
//! writing.

use crate::sources::LookupRequest;
use eramap_common::{store, Error, Result, TrackRecord};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

pub struct SharedDataset {
    records: RwLock<Vec<TrackRecord>>,
    /// Row count at construction; divergence means external corruption.
    expected_len: usize,
    /// Records attempted this run (resolved, given up, or skipped as done).
    processed: AtomicUsize,
    /// Cooperative stop signal: set once, never cleared.
    cancel: CancellationToken,
}

impl SharedDataset {
    pub fn new(records: Vec<TrackRecord>) -> Self {
        let expected_len = records.len();
        Self {
            records: RwLock::new(records),
            expected_len,
            processed: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Row count captured at construction.
    pub fn expected_len(&self) -> usize {
        self.expected_len
    }

    /// A clone of the stop signal, for workers and external cancellation.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Lookup fields for a record, or `None` for an out-of-range index.
    pub async fn lookup_request(&self, index: usize) -> Option<LookupRequest> {
        let records = self.records.read().await;
        records.get(index).map(LookupRequest::from_record)
    }

    /// Whether the record at `index` already carries a year.
    pub async fn is_resolved(&self, index: usize) -> bool {
        let records = self.records.read().await;
        records.get(index).is_some_and(|r| r.is_resolved())
    }

    /// Write a lookup outcome into the record at `index`.
    ///
    /// A record that is already resolved is left untouched: a year
    /// transitions at most once from `None` to a value, so re-running
    /// against a checkpoint can never clobber earlier work.
    pub async fn set_year(&self, index: usize, year: Option<i32>) {
        let mut records = self.records.write().await;
        match records.get_mut(index) {
            Some(record) if record.is_resolved() => {}
            Some(record) => record.year = year,
            None => warn!(index, "set_year on out-of-range index ignored"),
        }
    }

    /// Count of resolved records. Taken under the read lock, but workers may
    /// resolve more records the moment it is released; undercounting is safe
    /// here (it only delays an autosave).
    pub async fn resolved_count(&self) -> usize {
        let records = self.records.read().await;
        records.iter().filter(|r| r.is_resolved()).count()
    }

    /// Advance the progress counter by one attempted record.
    pub fn mark_processed(&self) -> usize {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Records attempted so far this run.
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// Guarded persist: verify the row count still matches the count captured
    /// at construction, then save. On mismatch the stop signal is set and
    /// nothing is written; a structurally corrupted dataset must not
    /// overwrite a good checkpoint.
    pub async fn save_if_safe(&self, path: &Path) -> Result<()> {
        let records = self.records.read().await;

        if records.len() != self.expected_len {
            error!(
                expected = self.expected_len,
                actual = records.len(),
                "dataset length changed underneath the run; stopping"
            );
            self.cancel.cancel();
            return Err(Error::Corruption {
                expected: self.expected_len,
                actual: records.len(),
            });
        }

        store::save_dataset(path, &records)
    }

    /// Snapshot of the records, for reporting and tests.
    pub async fn snapshot(&self) -> Vec<TrackRecord> {
        self.records.read().await.clone()
    }

    /// Direct mutable access, for corruption-injection in tests.
    #[doc(hidden)]
    pub async fn records_mut(&self) -> tokio::sync::RwLockWriteGuard<'_, Vec<TrackRecord>> {
        self.records.write().await
    }
}
