//! In-memory Store
//!
//! The "plain map" side of the comparison, with the same commit contract as
//! DiskStore and none of its durability.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::buffer::Batch;
use crate::error::{BatchError, Result};

use super::{display_bucket, validate_batch, validate_bucket, CommitInfo, Store};

/// Transactional in-process store
///
/// A commit applies the whole batch under one write lock, so readers see
/// all of it or none of it.
#[derive(Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>>,
    sequence: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits so far
    pub fn commit_count(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Number of keys in a bucket (None if the bucket does not exist)
    pub fn bucket_len(&self, bucket: &[u8]) -> Option<usize> {
        self.buckets.read().get(bucket).map(|b| b.len())
    }
}

impl Store for MemoryStore {
    fn create_bucket(&self, name: &[u8]) -> Result<()> {
        validate_bucket(name)?;
        self.buckets.write().entry(name.to_vec()).or_default();
        Ok(())
    }

    fn commit(&self, bucket: &[u8], batch: &Batch) -> Result<CommitInfo> {
        validate_batch(batch)?;

        let mut buckets = self.buckets.write();
        let target = buckets
            .get_mut(bucket)
            .ok_or_else(|| BatchError::BucketNotFound(display_bucket(bucket)))?;

        for (key, value) in batch {
            target.insert(key.to_vec(), value.to_vec());
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CommitInfo {
            sequence,
            entries: batch.len(),
        })
    }

    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        let buckets = self.buckets.read();
        let target = buckets
            .get(bucket)
            .ok_or_else(|| BatchError::BucketNotFound(display_bucket(bucket)))?;
        Ok(target.get(key).cloned())
    }
}
