//! Coalescer
//!
//! Asynchronous write path: callers submit single writes, a bounded pool of
//! workers merges whatever is queued into batches and commits them.
//!
//! ## Architecture
//! ```text
//!   submit() ──► bounded queue (queue_depth) ──► worker 1 ─┐
//!                                           ├──► worker 2 ─┼──► Store::commit
//!                                           └──► worker N ─┘
//!   barrier() waits until every submitted write has completed
//! ```
//!
//! - At most `workers` commits run at once
//! - `submit` blocks while the queue is full
//! - Writes carry no ordering with respect to each other; the barrier is
//!   the only ordering guarantee

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::buffer::Batch;
use crate::config::Config;
use crate::error::{BatchError, Result};
use crate::retry::RetryPolicy;
use crate::store::Store;

/// Worker pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerConfig {
    /// Worker threads, and so the bound on concurrent commits
    pub workers: usize,

    /// Writes that may wait in the queue before `submit` blocks
    pub queue_depth: usize,

    /// Most writes merged into one commit
    pub max_batch: usize,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 1024,
            max_batch: 256,
        }
    }
}

/// Writes completed since the previous barrier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoalesceReport {
    pub writes_completed: u64,
    pub batches_committed: u64,
    pub entries_committed: u64,
}

/// One coalesced commit that failed
#[derive(Debug)]
pub struct CoalesceFailure {
    pub error: BatchError,
    pub attempts: u32,

    /// The merged batch that was not committed
    pub undelivered: Batch,
}

/// Commits that failed since the previous barrier
#[derive(Debug, Error)]
#[error("{} coalesced commits failed", .failures.len())]
pub struct CoalesceError {
    pub failures: Vec<CoalesceFailure>,

    /// What did complete in the same window
    pub report: CoalesceReport,
}

impl CoalesceError {
    pub fn undelivered_entries(&self) -> usize {
        self.failures.iter().map(|f| f.undelivered.len()).sum()
    }
}

struct Write {
    key: Bytes,
    value: Bytes,
}

#[derive(Default)]
struct Progress {
    /// Submitted writes not yet completed
    in_flight: usize,
    report: CoalesceReport,
    failures: Vec<CoalesceFailure>,
}

struct Shared {
    progress: Mutex<Progress>,
    idle: Condvar,
}

/// Bounded worker pool in front of a store
pub struct Coalescer {
    sender: Option<Sender<Write>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl Coalescer {
    /// Spawn the worker pool committing into `bucket`
    pub fn new<S>(
        store: S,
        bucket: impl Into<Bytes>,
        config: CoalescerConfig,
        retry: RetryPolicy,
    ) -> Result<Self>
    where
        S: Store + 'static,
    {
        if config.workers == 0 || config.queue_depth == 0 || config.max_batch == 0 {
            return Err(BatchError::Config(format!(
                "coalescer needs workers, queue_depth and max_batch of at least 1: {:?}",
                config
            )));
        }

        let (sender, receiver) = channel::bounded(config.queue_depth);
        let shared = Arc::new(Shared {
            progress: Mutex::new(Progress::default()),
            idle: Condvar::new(),
        });
        let store = Arc::new(store);
        let bucket: Bytes = bucket.into();

        let mut coalescer = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(config.workers),
            shared,
        };

        for id in 0..config.workers {
            let worker = Worker {
                receiver: receiver.clone(),
                store: Arc::clone(&store),
                bucket: bucket.clone(),
                retry: retry.clone(),
                max_batch: config.max_batch,
                shared: Arc::clone(&coalescer.shared),
            };
            // On spawn failure, Drop closes the queue and joins the workers started so far
            let handle = std::thread::Builder::new()
                .name(format!("batchkv-coalesce-{}", id))
                .spawn(move || worker.run())?;
            coalescer.workers.push(handle);
        }

        tracing::debug!(
            "Coalescer started: {} workers, queue depth {}, max batch {}",
            config.workers,
            config.queue_depth,
            config.max_batch
        );

        Ok(coalescer)
    }

    /// Worker pool using the coalescer and retry settings of `config`
    pub fn from_config<S>(store: S, bucket: impl Into<Bytes>, config: &Config) -> Result<Self>
    where
        S: Store + 'static,
    {
        Self::new(store, bucket, config.coalescer, config.retry.clone())
    }

    /// Enqueue one write, blocking while the queue is full
    pub fn submit(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(BatchError::Closed)?;

        self.shared.progress.lock().in_flight += 1;

        let write = Write {
            key: key.into(),
            value: value.into(),
        };
        if sender.send(write).is_err() {
            self.complete_unsent();
            return Err(BatchError::Closed);
        }
        Ok(())
    }

    fn complete_unsent(&self) {
        let mut progress = self.shared.progress.lock();
        progress.in_flight -= 1;
        if progress.in_flight == 0 {
            self.shared.idle.notify_all();
        }
    }

    /// Block until every submitted write has completed
    ///
    /// Returns what completed since the previous barrier, or the failures
    /// in that window together with their undelivered entries.
    pub fn barrier(&self) -> std::result::Result<CoalesceReport, CoalesceError> {
        let mut progress = self.shared.progress.lock();
        while progress.in_flight > 0 {
            self.shared.idle.wait(&mut progress);
        }

        let report = std::mem::take(&mut progress.report);
        let failures = std::mem::take(&mut progress.failures);

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(CoalesceError { failures, report })
        }
    }

    /// Writes submitted but not yet completed
    pub fn in_flight(&self) -> usize {
        self.shared.progress.lock().in_flight
    }

    /// Wait at the barrier, then stop the workers
    pub fn shutdown(mut self) -> std::result::Result<CoalesceReport, CoalesceError> {
        let result = self.barrier();
        self.close();
        result
    }

    fn close(&mut self) {
        // Workers exit once the queue is closed and drained
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Coalescer worker panicked");
            }
        }
    }
}

impl Drop for Coalescer {
    fn drop(&mut self) {
        self.close();
    }
}

struct Worker<S: Store> {
    receiver: Receiver<Write>,
    store: Arc<S>,
    bucket: Bytes,
    retry: RetryPolicy,
    max_batch: usize,
    shared: Arc<Shared>,
}

impl<S: Store> Worker<S> {
    fn run(self) {
        while let Ok(first) = self.receiver.recv() {
            let mut batch = Batch::new();
            batch.insert(first.key, first.value);
            let mut writes = 1;

            // Coalesce whatever is already waiting, in queue order
            while writes < self.max_batch {
                match self.receiver.try_recv() {
                    Ok(write) => {
                        batch.insert(write.key, write.value);
                        writes += 1;
                    }
                    Err(_) => break,
                }
            }

            self.commit(batch, writes);
        }
    }

    fn commit(&self, batch: Batch, writes: usize) {
        // A panicking store must still complete these writes, or barrier() never returns
        let attempts_made = Cell::new(0);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.retry.run(|| {
                attempts_made.set(attempts_made.get() + 1);
                self.store.commit(&self.bucket, &batch)
            })
        }));
        let (result, attempts) = match outcome {
            Ok(finished) => finished,
            Err(payload) => (
                Err(BatchError::CommitPanicked(panic_message(payload.as_ref()))),
                attempts_made.get(),
            ),
        };

        let mut progress = self.shared.progress.lock();
        match result {
            Ok(info) => {
                progress.report.batches_committed += 1;
                progress.report.entries_committed += info.entries as u64;
                tracing::trace!(
                    "Coalesced {} writes into {} entries (sequence {})",
                    writes,
                    info.entries,
                    info.sequence
                );
            }
            Err(error) => {
                tracing::error!(
                    "Coalesced commit of {} entries failed after {} attempts: {}",
                    batch.len(),
                    attempts,
                    error
                );
                progress.failures.push(CoalesceFailure {
                    error,
                    attempts,
                    undelivered: batch,
                });
            }
        }

        progress.report.writes_completed += writes as u64;
        progress.in_flight -= writes;
        if progress.in_flight == 0 {
            self.shared.idle.notify_all();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
