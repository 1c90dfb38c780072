//! WAL Reader
//!
//! Handles reading records from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{BatchError, Result};
use crate::util::{le_u32, le_u64};

use super::{WalEntry, WalRecord, HEADER_SIZE};

/// Reads records from the start of a WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Total file length at open time
    file_len: u64,

    /// Offset just past the last record returned
    offset: u64,

    /// LSN of the last record returned
    last_lsn: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            file_len,
            offset: 0,
            last_lsn: 0,
        })
    }

    /// Read the next record
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: a whole record with a matching CRC
    /// - `Ok(None)`: clean end of log
    /// - `Err(WalCorruption)`: torn or damaged record at `valid_offset()`
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let remaining = self.file_len - self.offset;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            return Err(BatchError::WalCorruption(format!(
                "incomplete header at offset {} ({} bytes)",
                self.offset, remaining
            )));
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;

        let lsn = le_u64(&header[0..8]);
        let crc = le_u32(&header[8..12]);
        let len = le_u32(&header[12..16]) as u64;

        if len > remaining - HEADER_SIZE as u64 {
            return Err(BatchError::WalCorruption(format!(
                "incomplete payload at offset {}: need {} bytes, have {}",
                self.offset,
                len,
                remaining - HEADER_SIZE as u64
            )));
        }

        let mut data = vec![0u8; len as usize];
        self.reader.read_exact(&mut data)?;

        if crc32fast::hash(&data) != crc {
            return Err(BatchError::WalCorruption(format!(
                "CRC mismatch for LSN {} at offset {}",
                lsn, self.offset
            )));
        }

        if lsn <= self.last_lsn {
            return Err(BatchError::WalCorruption(format!(
                "LSN {} does not follow {}",
                lsn, self.last_lsn
            )));
        }

        let record = WalRecord::decode(&data).map_err(|e| {
            BatchError::WalCorruption(format!("undecodable record LSN {}: {}", lsn, e))
        })?;

        self.offset += HEADER_SIZE as u64 + len;
        self.last_lsn = lsn;

        Ok(Some(WalEntry { lsn, record }))
    }

    /// Offset just past the last valid record read so far
    pub fn valid_offset(&self) -> u64 {
        self.offset
    }

    /// File length at open time
    pub fn file_len(&self) -> u64 {
        self.file_len
    }
}
