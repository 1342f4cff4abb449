//! The concurrent enrichment engine
//!
//! - [`partition`] assigns pending records to the three lanes
//! - [`state`] owns the shared dataset, progress counters, and stop signal
//! - [`worker`] drains one lane against one catalog source
//! - [`autosave`] periodically checkpoints progress behind a safety guard
//! - [`coordinator`] wires it all together and handles cancellation

pub mod autosave;
pub mod coordinator;
pub mod partition;
pub mod state;
pub mod worker;

pub use eramap_common::events::Lane;
