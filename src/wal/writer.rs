//! WAL Writer
//!
//! Handles appending commit records to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::config::SyncPolicy;
use crate::error::Result;

use super::entry::frame;
use super::WalRecord;

/// Writes commit records to the WAL file
pub struct WalWriter {
    /// Log file, positioned at `valid_len`
    file: File,

    /// LSN the next record will receive
    next_lsn: u64,

    /// How often to fsync
    sync_policy: SyncPolicy,

    /// Records written since the last fsync
    unsynced: usize,

    /// Length of the log up to the end of the last fully written record
    valid_len: u64,
}

impl WalWriter {
    /// Create (or truncate) a WAL file, numbering records from `next_lsn`
    pub fn create(path: &Path, sync_policy: SyncPolicy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.sync_all()?;

        Ok(Self {
            file,
            next_lsn: next_lsn.max(1),
            sync_policy,
            unsynced: 0,
            valid_len: 0,
        })
    }

    /// Append a record, returning its LSN
    ///
    /// A record too large for the frame header is rejected with
    /// `InvalidEntry` before anything is written. On a write failure the file
    /// is cut back to the end of the previous record so no partial frame is
    /// left behind.
    pub fn append(&mut self, record: &WalRecord) -> Result<u64> {
        let data = record.encode()?;
        let lsn = self.next_lsn;
        // Checked before anything is written
        let framed = frame(lsn, &data)?;

        if let Err(e) = self.write_frame(&framed) {
            if let Err(rollback) = self.rollback() {
                tracing::error!("WAL rollback after failed append failed: {}", rollback);
            }
            return Err(e);
        }

        self.next_lsn += 1;
        self.valid_len += framed.len() as u64;
        Ok(lsn)
    }

    fn write_frame(&mut self, framed: &[u8]) -> Result<()> {
        self.file.write_all(framed)?;
        self.unsynced += 1;

        let due = match self.sync_policy {
            SyncPolicy::EveryCommit => true,
            SyncPolicy::EveryNCommits { count } => self.unsynced >= count,
        };
        if due {
            self.file.sync_data()?;
            self.unsynced = 0;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.file.set_len(self.valid_len)?;
        self.file.seek(SeekFrom::Start(self.valid_len))?;
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard every record (after its contents are durable elsewhere)
    ///
    /// LSNs keep counting from where they were.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        self.valid_len = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// LSN of the last appended record (0 if none yet)
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    /// Bytes of valid records currently in the log
    pub fn len(&self) -> u64 {
        self.valid_len
    }

    pub fn is_empty(&self) -> bool {
        self.valid_len == 0
    }
}
