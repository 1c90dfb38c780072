//! Disk Store
//!
//! The embedded durable store the batching strategy amortizes against.
//!
//! ## Responsibilities
//! - Turn each commit into one fsynced WAL record (the fixed per-commit cost)
//! - Apply committed batches to the MemTable atomically
//! - Checkpoint the MemTable into SSTables when it grows too large
//! - Recover whole commits from the WAL on startup

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;

use crate::buffer::Batch;
use crate::config::Config;
use crate::error::{BatchError, Result};
use crate::memtable::MemTable;
use crate::storage::StorageManager;
use crate::wal::{Operation, RecoveryResult, WalRecord, WalRecovery, WalWriter};

use super::{display_bucket, validate_batch, validate_bucket, CommitInfo, Store};

/// Prefix of bucket marker keys
const BUCKET_MARKER: u8 = 0x00;

/// Prefix of data keys
const DATA_PREFIX: u8 = 0x01;

/// Durable embedded key-value store
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Commits** (create_bucket/commit/checkpoint): serialized by the `wal`
///   mutex, which doubles as the commit lock
///   - Only ONE commit at a time
///   - Must acquire: wal → memtable → storage (write)
///   - Waits at most `commit_timeout_ms`, then fails with `StoreBusy`
///
/// - **Reads** (get): no commit lock needed
///   - MemTable uses internal RwLock (many concurrent readers)
///   - StorageManager takes its write lock for SSTable reads
///     (SSTableReader::get needs &mut self for file seeking)
pub struct DiskStore {
    config: Config,

    /// Directory for all SSTables
    storage_dir: PathBuf,

    /// Commit log; holding this lock is holding the commit lock
    wal: Mutex<WalWriter>,

    /// Committed entries not yet checkpointed
    memtable: MemTable,

    /// Checkpointed entries
    storage: StorageManager,

    /// What the last open recovered from the WAL
    recovery: RecoveryResult,
}

impl DiskStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Recover whole commits from the WAL, discarding a torn tail
    /// 4. Checkpoint recovered commits, then start a fresh WAL
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        let recovery = if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;

            for entry in entries {
                memtable.put_all(entry.record.operations.into_iter().map(Self::operation_entry));
            }

            if result.records_recovered > 0 || result.was_truncated {
                tracing::info!(
                    "WAL recovery: {} commits ({} operations) recovered, {} bytes discarded, last_lsn={}",
                    result.records_recovered,
                    result.operations_recovered,
                    result.bytes_discarded,
                    result.last_lsn
                );
            }

            // Make recovered commits durable in an SSTable before the WAL is reset
            if !memtable.is_empty() {
                tracing::info!(
                    "Checkpointing {} recovered entries to SSTable",
                    memtable.entry_count()
                );
                storage.flush(&memtable)?;
                memtable.clear();
            }

            result
        } else {
            RecoveryResult::default()
        };

        let wal = WalWriter::create(&wal_path, config.sync_policy, recovery.last_lsn + 1)?;

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            recovery,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Force a checkpoint of the MemTable into a new SSTable
    pub fn checkpoint(&self) -> Result<()> {
        let mut wal = self.wal.lock();
        self.checkpoint_locked(&mut wal)
    }

    /// Close the store gracefully
    ///
    /// Checkpoints pending commits and syncs the WAL
    pub fn close(self) -> Result<()> {
        let mut wal = self.wal.lock();
        self.checkpoint_locked(&mut wal)?;
        wal.sync()
    }

    /// Verify the data checksums of every SSTable
    pub fn verify(&self) -> Result<()> {
        self.storage.verify()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Acquire the commit lock, waiting at most `commit_timeout_ms`
    fn lock_commit(&self) -> Result<parking_lot::MutexGuard<'_, WalWriter>> {
        let timeout = Duration::from_millis(self.config.commit_timeout_ms);
        self.wal.try_lock_for(timeout).ok_or_else(|| {
            BatchError::StoreBusy(format!(
                "commit lock not acquired within {} ms",
                self.config.commit_timeout_ms
            ))
        })
    }

    /// Called with the commit lock held
    fn checkpoint_locked(&self, wal: &mut WalWriter) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        let table = self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        wal.truncate()?;

        tracing::debug!(
            "Checkpoint complete: {} entries moved to {}",
            table.entry_count,
            table.path.display()
        );
        Ok(())
    }

    /// Append a record and apply it, checkpointing if the MemTable is full
    fn append_and_apply(&self, wal: &mut WalWriter, operations: Vec<Operation>) -> Result<u64> {
        let record = WalRecord::new(operations);
        let lsn = wal.append(&record)?;

        let new_size = self
            .memtable
            .put_all(record.operations.into_iter().map(Self::operation_entry));

        // The commit is already durable in the WAL; a failed checkpoint
        // is retried on the next commit instead of failing this one.
        if new_size >= self.config.memtable_size_limit {
            if let Err(e) = self.checkpoint_locked(wal) {
                tracing::error!("Checkpoint after LSN {} failed: {}", lsn, e);
            }
        }

        Ok(lsn)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        if self.memtable.contains(key) {
            return Ok(true);
        }
        Ok(self.storage.get(key)?.is_some())
    }

    fn ensure_bucket(&self, bucket: &[u8]) -> Result<()> {
        if self.contains(&bucket_marker(bucket))? {
            Ok(())
        } else {
            Err(BatchError::BucketNotFound(display_bucket(bucket)))
        }
    }

    fn operation_entry(operation: Operation) -> (Vec<u8>, Vec<u8>) {
        match operation {
            Operation::CreateBucket { name } => (bucket_marker(&name), Vec::new()),
            Operation::Put { bucket, key, value } => (data_key(&bucket, &key), value),
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// What the last open recovered from the WAL
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// LSN of the last commit record
    pub fn last_lsn(&self) -> u64 {
        self.wal.lock().current_lsn()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Store for DiskStore {
    fn create_bucket(&self, name: &[u8]) -> Result<()> {
        validate_bucket(name)?;

        let mut wal = self.lock_commit()?;
        if self.contains(&bucket_marker(name))? {
            return Ok(());
        }

        self.append_and_apply(&mut wal, vec![Operation::CreateBucket { name: name.to_vec() }])?;
        tracing::debug!("Created bucket {}", display_bucket(name));
        Ok(())
    }

    fn commit(&self, bucket: &[u8], batch: &Batch) -> Result<CommitInfo> {
        let mut wal = self.lock_commit()?;

        // Reject before anything reaches the WAL
        self.ensure_bucket(bucket)?;
        validate_batch(batch)?;

        let operations = batch
            .iter()
            .map(|(key, value)| Operation::Put {
                bucket: bucket.to_vec(),
                key: key.to_vec(),
                value: value.to_vec(),
            })
            .collect();

        let lsn = self.append_and_apply(&mut wal, operations)?;

        tracing::trace!("Committed {} entries at LSN {}", batch.len(), lsn);

        Ok(CommitInfo {
            sequence: lsn,
            entries: batch.len(),
        })
    }

    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_bucket(bucket)?;

        let internal = data_key(bucket, key);
        if let Some(value) = self.memtable.get(&internal) {
            return Ok(Some(value));
        }
        self.storage.get(&internal)
    }
}

/// `0x00 ‖ name`
fn bucket_marker(name: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(BUCKET_MARKER);
    key.extend_from_slice(name);
    key
}

/// `0x01 ‖ u32_be(len(bucket)) ‖ bucket ‖ key`
fn data_key(bucket: &[u8], key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + bucket.len() + key.len());
    out.push(DATA_PREFIX);
    out.extend_from_slice(&(bucket.len() as u32).to_be_bytes());
    out.extend_from_slice(bucket);
    out.extend_from_slice(key);
    out
}
