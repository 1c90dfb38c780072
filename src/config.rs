//! Configuration for batchkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::coalescer::CoalescerConfig;
use crate::error::{BatchError, Result};
use crate::flusher::FailurePolicy;
use crate::retry::RetryPolicy;

/// Main configuration for a batched-write run
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all DiskStore files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (commit log)
    ///     └── sstables/        (sorted table files)
    pub data_dir: PathBuf,

    /// Sync policy: how often to fsync the commit log
    pub sync_policy: SyncPolicy,

    /// Memtable size (in bytes) at which DiskStore checkpoints to a table file
    pub memtable_size_limit: usize,

    /// How long a commit waits for the store's commit lock (milliseconds)
    pub commit_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Batching Configuration
    // -------------------------------------------------------------------------
    /// Buffered entry count above which a flush is triggered
    pub flush_threshold: usize,

    /// Retry behavior for failed commits
    pub retry: RetryPolicy,

    /// What happens to drained entries when a flush fails
    pub failure_policy: FailurePolicy,

    // -------------------------------------------------------------------------
    // Coalescer Configuration
    // -------------------------------------------------------------------------
    /// Worker pool sizing for the coalescing write path
    pub coalescer: CoalescerConfig,
}

/// Commit log sync policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// fsync after every commit record (safest, slowest)
    EveryCommit,

    /// fsync after N commit records
    EveryNCommits { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./batchkv_data"),
            sync_policy: SyncPolicy::EveryCommit,
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            commit_timeout_ms: 1000,
            flush_threshold: 1000,
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::default(),
            coalescer: CoalescerConfig::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings that would make a component unusable
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(BatchError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.coalescer.workers == 0 {
            return Err(BatchError::Config(
                "coalescer.workers must be at least 1".to_string(),
            ));
        }
        if self.coalescer.queue_depth == 0 {
            return Err(BatchError::Config(
                "coalescer.queue_depth must be at least 1".to_string(),
            ));
        }
        if self.coalescer.max_batch == 0 {
            return Err(BatchError::Config(
                "coalescer.max_batch must be at least 1".to_string(),
            ));
        }
        if let SyncPolicy::EveryNCommits { count: 0 } = self.sync_policy {
            return Err(BatchError::Config(
                "sync_policy count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all DiskStore files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the commit log sync policy
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.config.sync_policy = policy;
        self
    }

    /// Set the memtable checkpoint limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the commit lock timeout (in milliseconds)
    pub fn commit_timeout_ms(mut self, ms: u64) -> Self {
        self.config.commit_timeout_ms = ms;
        self
    }

    /// Set the flush threshold (in buffered entries)
    pub fn flush_threshold(mut self, threshold: usize) -> Self {
        self.config.flush_threshold = threshold;
        self
    }

    /// Set the retry policy for commits
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set the failure policy for drained entries
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Set the coalescer worker pool configuration
    pub fn coalescer(mut self, coalescer: CoalescerConfig) -> Self {
        self.config.coalescer = coalescer;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
