//! Shared test stores
//!
//! Wrappers around MemoryStore that inject failures or record how commits
//! arrive.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use batchkv::buffer::Batch;
use batchkv::error::{BatchError, Result};
use batchkv::store::{CommitInfo, MemoryStore, Store};
use parking_lot::Mutex;

pub const BUCKET: &[u8] = b"MyBucket";

/// MemoryStore with `BUCKET` already created
pub fn memory_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.create_bucket(BUCKET).unwrap();
    store
}

/// How a FlakyStore fails
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// `StoreBusy` (retryable)
    Busy,
    /// `Storage` (fatal)
    Fatal,
}

/// Fails the first `failures` commits, then delegates
pub struct FlakyStore {
    inner: MemoryStore,
    remaining: AtomicUsize,
    failure: Failure,
    attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failures: usize, failure: Failure) -> Arc<Self> {
        let inner = MemoryStore::new();
        inner.create_bucket(BUCKET).unwrap();
        Arc::new(Self {
            inner,
            remaining: AtomicUsize::new(failures),
            failure,
            attempts: AtomicUsize::new(0),
        })
    }

    /// Commit calls seen, failed or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn set_failures(&self, failures: usize) {
        self.remaining.store(failures, Ordering::SeqCst);
    }
}

impl Store for FlakyStore {
    fn create_bucket(&self, name: &[u8]) -> Result<()> {
        self.inner.create_bucket(name)
    }

    fn commit(&self, bucket: &[u8], batch: &Batch) -> Result<CommitInfo> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(match self.failure {
                Failure::Busy => BatchError::StoreBusy("injected".to_string()),
                Failure::Fatal => BatchError::Storage("injected".to_string()),
            });
        }
        self.inner.commit(bucket, batch)
    }

    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }
}

/// Records the size of every commit
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    commits: Mutex<Vec<usize>>,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        let store = Self::default();
        store.inner.create_bucket(BUCKET).unwrap();
        Arc::new(store)
    }

    /// Entry count of each commit, in order
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.commits.lock().clone()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().len()
    }
}

impl Store for CountingStore {
    fn create_bucket(&self, name: &[u8]) -> Result<()> {
        self.inner.create_bucket(name)
    }

    fn commit(&self, bucket: &[u8], batch: &Batch) -> Result<CommitInfo> {
        let info = self.inner.commit(bucket, batch)?;
        self.commits.lock().push(batch.len());
        Ok(info)
    }

    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }
}

/// Slow commits that record the highest number running at once
pub struct ConcurrencyTrackingStore {
    inner: MemoryStore,
    delay: Duration,
    current: AtomicUsize,
    max_seen: AtomicUsize,
}

impl ConcurrencyTrackingStore {
    pub fn new(delay: Duration) -> Arc<Self> {
        let inner = MemoryStore::new();
        inner.create_bucket(BUCKET).unwrap();
        Arc::new(Self {
            inner,
            delay,
            current: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl Store for ConcurrencyTrackingStore {
    fn create_bucket(&self, name: &[u8]) -> Result<()> {
        self.inner.create_bucket(name)
    }

    fn commit(&self, bucket: &[u8], batch: &Batch) -> Result<CommitInfo> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        let result = self.inner.commit(bucket, batch);
        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }
}

/// Lets the first `successes` commits through, then fails every commit
/// fatally
pub struct FailAfterStore {
    inner: MemoryStore,
    remaining_ok: AtomicUsize,
}

impl FailAfterStore {
    pub fn new(successes: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            remaining_ok: AtomicUsize::new(successes),
        })
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl Store for FailAfterStore {
    fn create_bucket(&self, name: &[u8]) -> Result<()> {
        self.inner.create_bucket(name)
    }

    fn commit(&self, bucket: &[u8], batch: &Batch) -> Result<CommitInfo> {
        let allowed = self
            .remaining_ok
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(BatchError::Storage("injected".to_string()));
        }
        self.inner.commit(bucket, batch)
    }

    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }
}

/// Panics on the first `panics` commits, then delegates
pub struct PanicStore {
    inner: MemoryStore,
    remaining: AtomicUsize,
}

impl PanicStore {
    pub fn new(panics: usize) -> Arc<Self> {
        let inner = MemoryStore::new();
        inner.create_bucket(BUCKET).unwrap();
        Arc::new(Self {
            inner,
            remaining: AtomicUsize::new(panics),
        })
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl Store for PanicStore {
    fn create_bucket(&self, name: &[u8]) -> Result<()> {
        self.inner.create_bucket(name)
    }

    fn commit(&self, bucket: &[u8], batch: &Batch) -> Result<CommitInfo> {
        let panicking = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if panicking {
            panic!("injected commit panic");
        }
        self.inner.commit(bucket, batch)
    }

    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }
}
