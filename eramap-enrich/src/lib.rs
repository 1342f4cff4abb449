//! eramap-enrich library interface
//!
//! Concurrent multi-source release-year enrichment: three rate-limited
//! catalog clients, three partitioned lane workers over one shared dataset,
//! an autosave supervisor with a guarded persist, and a coordinator that
//! owns startup, cancellation, and shutdown.

pub mod config;
pub mod engine;
pub mod filter;
pub mod sources;

pub use engine::coordinator::{Enricher, RunOutcome, RunReport};
pub use engine::state::SharedDataset;
