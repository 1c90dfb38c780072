//! Store Module
//!
//! The backing-store transaction API the flusher commits batches against.
//!
//! ## Implementations
//! - `MemoryStore`: transactional in-process map (baseline)
//! - `DiskStore`: durable embedded store; every commit is one fsynced
//!   log record, checkpointed into sorted table files
//!
//! Both validate a batch completely before writing any of it, so an invalid
//! entry rejects the whole commit.

mod disk;
mod memory;

use std::sync::Arc;

use crate::buffer::Batch;
use crate::error::{BatchError, Result};

pub use disk::DiskStore;
pub use memory::MemoryStore;

/// Maximum key (and bucket name) length in bytes
pub const MAX_KEY_SIZE: usize = 32768;

/// Maximum value length in bytes
pub const MAX_VALUE_SIZE: usize = (1 << 31) - 2;

/// Outcome of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit sequence number, increasing within an open store
    pub sequence: u64,

    /// Number of entries written
    pub entries: usize,
}

/// A transactional key-value store organised in buckets
pub trait Store: Send + Sync {
    /// Create a bucket if it does not exist yet
    fn create_bucket(&self, name: &[u8]) -> Result<()>;

    /// Commit every entry of `batch` into `bucket` as one atomic unit
    fn commit(&self, bucket: &[u8], batch: &Batch) -> Result<CommitInfo>;

    /// Read the committed value of a key
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn create_bucket(&self, name: &[u8]) -> Result<()> {
        (**self).create_bucket(name)
    }

    fn commit(&self, bucket: &[u8], batch: &Batch) -> Result<CommitInfo> {
        (**self).commit(bucket, batch)
    }

    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(bucket, key)
    }
}

/// Check a bucket name against the key rules
pub fn validate_bucket(name: &[u8]) -> Result<()> {
    if name.is_empty() {
        return Err(BatchError::InvalidEntry("bucket name required".to_string()));
    }
    if name.len() > MAX_KEY_SIZE {
        return Err(BatchError::InvalidEntry(format!(
            "bucket name too large: {} bytes",
            name.len()
        )));
    }
    Ok(())
}

/// Check every entry of a batch
pub fn validate_batch(batch: &Batch) -> Result<()> {
    for (key, value) in batch {
        if key.is_empty() {
            return Err(BatchError::InvalidEntry("key required".to_string()));
        }
        if key.len() > MAX_KEY_SIZE {
            return Err(BatchError::InvalidEntry(format!(
                "key too large: {} bytes",
                key.len()
            )));
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(BatchError::InvalidEntry(format!(
                "value too large: {} bytes",
                value.len()
            )));
        }
    }
    Ok(())
}

pub(crate) fn display_bucket(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}
