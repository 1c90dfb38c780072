//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::{BatchError, Result};

use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of whole records recovered
    pub records_recovered: u64,

    /// Number of operations inside the recovered records
    pub operations_recovered: u64,

    /// Last valid LSN (0 if the log was empty)
    pub last_lsn: u64,

    /// Bytes after the last valid record (torn or corrupted tail)
    pub bytes_discarded: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover records from a WAL file
    ///
    /// This will:
    /// 1. Read all valid records in order
    /// 2. Stop at the first torn or corrupted record
    /// 3. Truncate the file to the valid prefix
    /// 4. Return the valid records
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, mut result) = Self::scan(path)?;

        if result.bytes_discarded > 0 {
            let valid_len = Self::valid_len(path, &result)?;
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            result.was_truncated = true;

            tracing::warn!(
                "WAL tail discarded: {} bytes after LSN {}",
                result.bytes_discarded,
                result.last_lsn
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    result.records_recovered += 1;
                    result.operations_recovered += entry.record.operations.len() as u64;
                    result.last_lsn = entry.lsn;
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(BatchError::WalCorruption(reason)) => {
                    tracing::debug!("WAL scan stopped: {}", reason);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        result.bytes_discarded = reader.file_len() - reader.valid_offset();
        Ok((entries, result))
    }

    fn valid_len(path: &Path, result: &RecoveryResult) -> Result<u64> {
        let file_len = std::fs::metadata(path)?.len();
        Ok(file_len - result.bytes_discarded)
    }
}
