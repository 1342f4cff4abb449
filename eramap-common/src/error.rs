//! Common error types for eramap

use thiserror::Error;

/// Common result type for eramap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the eramap tools
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error (wraps csv::Error)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset row count diverged from the count captured at startup.
    /// All further mutation and persistence is unsafe once this fires.
    #[error("dataset length changed from {expected} to {actual} rows; refusing to persist")]
    Corruption { expected: usize, actual: usize },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
