//! Batch Flusher
//!
//! Turns the contents of a WriteBuffer into one atomic commit.
//!
//! ## Flush Flow
//! 1. `Idle → Flushing`
//! 2. Drain the buffer into a `Batch`
//! 3. Commit it against the owned store, retrying transient failures
//! 4. On failure, hand the batch back or requeue it (never drop it)
//! 5. `Flushing → Idle`
//!
//! `flush` takes both the flusher and the buffer by `&mut`, so a second
//! flush cannot start while one is running.

use std::time::{Duration, Instant};

use bytes::Bytes;
use thiserror::Error;

use crate::buffer::{Batch, WriteBuffer};
use crate::config::Config;
use crate::error::BatchError;
use crate::retry::RetryPolicy;
use crate::store::Store;

/// What to do with drained entries when their commit fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Return the batch to the caller inside the error
    #[default]
    ReturnEntries,

    /// Put the batch back into the buffer
    Requeue,
}

/// Flusher state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlusherState {
    Idle,
    Flushing,
}

/// A successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
    /// Store sequence of the commit
    pub sequence: u64,

    /// Entries committed
    pub entries: usize,

    /// Attempts it took, including the successful one
    pub attempts: u32,

    pub elapsed: Duration,
}

/// Result of a flush that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered; no commit was made
    Empty,

    Committed(CommitReport),
}

impl FlushOutcome {
    pub fn report(&self) -> Option<CommitReport> {
        match self {
            FlushOutcome::Empty => None,
            FlushOutcome::Committed(report) => Some(*report),
        }
    }
}

/// Where the entries of a failed flush went
#[derive(Debug)]
pub enum Undelivered {
    /// Restored into the buffer
    Requeued { count: usize },

    /// Handed back to the caller
    Returned(Batch),
}

impl Undelivered {
    /// Number of entries that were not committed
    pub fn len(&self) -> usize {
        match self {
            Undelivered::Requeued { count } => *count,
            Undelivered::Returned(batch) => batch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A failed flush
#[derive(Debug, Error)]
pub enum FlushError {
    /// A transient failure that persisted through every allowed attempt
    #[error("commit failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: BatchError,
        undelivered: Undelivered,
    },

    /// A failure that retrying cannot fix
    #[error("commit failed fatally: {source}")]
    Fatal {
        attempts: u32,
        #[source]
        source: BatchError,
        undelivered: Undelivered,
    },
}

impl FlushError {
    /// True for `Exhausted`: the same batch may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlushError::Exhausted { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            FlushError::Exhausted { attempts, .. } | FlushError::Fatal { attempts, .. } => *attempts,
        }
    }

    pub fn cause(&self) -> &BatchError {
        match self {
            FlushError::Exhausted { source, .. } | FlushError::Fatal { source, .. } => source,
        }
    }

    pub fn undelivered(&self) -> &Undelivered {
        match self {
            FlushError::Exhausted { undelivered, .. } | FlushError::Fatal { undelivered, .. } => {
                undelivered
            }
        }
    }

    /// Take the returned batch, if the entries were handed back
    pub fn into_undelivered_batch(self) -> Option<Batch> {
        match self {
            FlushError::Exhausted { undelivered, .. } | FlushError::Fatal { undelivered, .. } => {
                match undelivered {
                    Undelivered::Returned(batch) => Some(batch),
                    Undelivered::Requeued { .. } => None,
                }
            }
        }
    }
}

/// Running totals across flushes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub batches_committed: u64,
    pub entries_committed: u64,
    pub failed_flushes: u64,
}

/// Commits buffered entries against an owned store handle
pub struct BatchFlusher<S: Store> {
    store: S,
    bucket: Bytes,
    retry: RetryPolicy,
    failure_policy: FailurePolicy,
    state: FlusherState,
    stats: FlushStats,
}

impl<S: Store> BatchFlusher<S> {
    /// Flusher committing into `bucket`, with no retries and
    /// `FailurePolicy::ReturnEntries`
    pub fn new(store: S, bucket: impl Into<Bytes>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::default(),
            state: FlusherState::Idle,
            stats: FlushStats::default(),
        }
    }

    /// Flusher using the retry and failure policies of `config`
    pub fn from_config(store: S, bucket: impl Into<Bytes>, config: &Config) -> Self {
        Self::new(store, bucket)
            .with_retry(config.retry.clone())
            .with_failure_policy(config.failure_policy)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Drain `buffer` and commit its whole contents as one transaction
    pub fn flush(&mut self, buffer: &mut WriteBuffer) -> Result<FlushOutcome, FlushError> {
        if self.state == FlusherState::Flushing {
            // Left over from a commit that unwound
            tracing::warn!("Previous flush did not complete; its batch was not delivered");
            self.state = FlusherState::Idle;
        }

        if buffer.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        self.state = FlusherState::Flushing;
        let batch = buffer.drain();
        let outcome = self.commit(batch, buffer);
        self.state = FlusherState::Idle;
        outcome
    }

    fn commit(&mut self, batch: Batch, buffer: &mut WriteBuffer) -> Result<FlushOutcome, FlushError> {
        let started = Instant::now();
        let (result, attempts) = self.retry.run(|| self.store.commit(&self.bucket, &batch));

        match result {
            Ok(info) => {
                self.stats.batches_committed += 1;
                self.stats.entries_committed += info.entries as u64;

                let report = CommitReport {
                    sequence: info.sequence,
                    entries: info.entries,
                    attempts,
                    elapsed: started.elapsed(),
                };
                tracing::debug!(
                    "Flushed {} entries (sequence {}, {} attempts, {:?})",
                    report.entries,
                    report.sequence,
                    report.attempts,
                    report.elapsed
                );
                Ok(FlushOutcome::Committed(report))
            }
            Err(source) => {
                self.stats.failed_flushes += 1;
                let retryable = source.is_retryable();

                tracing::error!(
                    "Flush of {} entries failed after {} attempts: {}",
                    batch.len(),
                    attempts,
                    source
                );

                let undelivered = match self.failure_policy {
                    FailurePolicy::ReturnEntries => Undelivered::Returned(batch),
                    FailurePolicy::Requeue => {
                        let count = batch.len();
                        buffer.restore(batch);
                        Undelivered::Requeued { count }
                    }
                };

                Err(if retryable {
                    FlushError::Exhausted {
                        attempts,
                        source,
                        undelivered,
                    }
                } else {
                    FlushError::Fatal {
                        attempts,
                        source,
                        undelivered,
                    }
                })
            }
        }
    }

    /// `Flushing` outside of `flush` means the last commit panicked
    pub fn state(&self) -> FlusherState {
        self.state
    }

    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    pub fn bucket(&self) -> &[u8] {
        &self.bucket
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }
}
