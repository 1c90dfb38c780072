//! Error types for batchkv
//!
//! Provides a unified error type for all operations, plus the
//! retryable/fatal classification the flusher relies on.

use std::io::ErrorKind;

use thiserror::Error;

/// Result type alias using BatchError
pub type Result<T> = std::result::Result<T, BatchError>;

/// Unified error type for batchkv operations
#[derive(Debug, Error)]
pub enum BatchError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Store busy: {0}")]
    StoreBusy(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    #[error("Write pipeline closed")]
    Closed,

    #[error("Commit panicked: {0}")]
    CommitPanicked(String),

    #[error("Run aborted after {committed} committed entries: {source}")]
    Aborted {
        committed: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BatchError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Only transient conditions qualify. Anything that would fail the same
    /// way again (missing bucket, invalid entry, corruption) is fatal.
    pub fn is_retryable(&self) -> bool {
        match self {
            BatchError::Io(e) => matches!(
                e.kind(),
                ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
            ),
            BatchError::StoreBusy(_) => true,
            _ => false,
        }
    }
}

impl From<bincode::Error> for BatchError {
    fn from(e: bincode::Error) -> Self {
        BatchError::Serialization(e.to_string())
    }
}
