//! Error types for moex-harvest
//!
//! Per-date failures (a non-200 response, a transport error, a payload with no
//! extractable table) are *not* errors: they are logged and the date is dropped
//! for the run. The types here cover everything that aborts a run: bad CLI
//! bounds, store corruption, and coordination failures between workers.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for moex-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for moex-harvest
#[derive(Debug, Error)]
pub enum Error {
    /// A date key was not a well-formed `YYYYMMDD` calendar date
    #[error("invalid date key: {0:?} (expected YYYYMMDD)")]
    InvalidDate(String),

    /// The requested range has `start > end`
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange {
        /// Requested start key, canonical form
        start: String,
        /// Requested end key, canonical form
        end: String,
    },

    /// Merge store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP client could not be constructed
    ///
    /// Per-date fetch failures never surface here; they resolve to `None`.
    #[error("HTTP client error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error outside the store (cleanup, bench output)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An async task could not be joined
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A worker thread panicked or dropped its result channel before
    /// delivering results
    #[error("worker lost: {0}")]
    WorkerLost(String),
}

/// Merge-store errors
///
/// All variants carry the store path; the store is the run's deliverable, so
/// any of these aborts the run.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not open or lock the store file
    #[error("failed to lock store {path}: {source}")]
    Lock {
        /// Store file path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Could not read existing store contents for the key existence check
    #[error("failed to read store {path}: {source}")]
    Read {
        /// Store file path
        path: PathBuf,
        /// Underlying CSV error
        source: csv::Error,
    },

    /// Could not append or flush committed rows
    #[error("failed to append to store {path}: {source}")]
    Append {
        /// Store file path
        path: PathBuf,
        /// Underlying CSV or I/O error
        source: csv::Error,
    },
}
