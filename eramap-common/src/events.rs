//! Event types for the enrichment run
//!
//! Events are broadcast via [`EventBus`]; the CLI subscribes for progress
//! reporting. Emission never blocks and never fails the emitting component:
//! an event with no listeners is simply dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// One of the three dispatch lanes, each bound to one catalog service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    Spotify,
    MusicBrainz,
    Discogs,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::Spotify, Lane::MusicBrainz, Lane::Discogs];

    pub fn name(&self) -> &'static str {
        match self {
            Lane::Spotify => "Spotify",
            Lane::MusicBrainz => "MusicBrainz",
            Lane::Discogs => "Discogs",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Enrichment run events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EnrichEvent {
    /// A run started with the given amount of pending work
    RunStarted {
        run_id: Uuid,
        total_records: usize,
        total_pending: usize,
        timestamp: DateTime<Utc>,
    },

    /// A lane worker finished one record (resolved or given up)
    RecordProcessed {
        run_id: Uuid,
        lane: Lane,
        index: usize,
        /// Whether the record now carries a year
        resolved: bool,
    },

    /// The autosave supervisor persisted a checkpoint
    Autosaved {
        run_id: Uuid,
        resolved: usize,
        path: String,
        timestamp: DateTime<Utc>,
    },

    /// Guarded persist found a row-count mismatch; the run is unwinding
    CorruptionDetected {
        run_id: Uuid,
        expected: usize,
        actual: usize,
    },

    /// External cancellation observed; workers are draining
    Cancelled { run_id: Uuid, timestamp: DateTime<Utc> },

    /// Run finished (normally or after cancellation drain)
    RunCompleted {
        run_id: Uuid,
        resolved: usize,
        unresolved: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`EnrichEvent`]
///
/// Thin wrapper over `tokio::sync::broadcast`: cheap to clone, subscribers
/// only see events emitted after they subscribe, and slow subscribers lag
/// rather than block the emitters.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EnrichEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EnrichEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers. No-op when nobody is listening.
    pub fn emit(&self, event: EnrichEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_receives_emitted_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let run_id = Uuid::new_v4();
        bus.emit(EnrichEvent::RecordProcessed {
            run_id,
            lane: Lane::Discogs,
            index: 7,
            resolved: true,
        });

        match rx.recv().await.unwrap() {
            EnrichEvent::RecordProcessed { lane, index, resolved, .. } => {
                assert_eq!(lane, Lane::Discogs);
                assert_eq!(index, 7);
                assert!(resolved);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        // must not panic or error
        bus.emit(EnrichEvent::Cancelled {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn test_lane_names() {
        assert_eq!(Lane::Spotify.name(), "Spotify");
        assert_eq!(Lane::ALL.len(), 3);
    }
}
