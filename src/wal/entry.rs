//! WAL record definitions
//!
//! Defines the payload of a commit record and its on-disk framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};

/// Frame header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Payload of one commit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalRecord {
    /// Timestamp (unix millis) when the record was created
    pub timestamp: u64,

    /// Every mutation of the commit, applied together or not at all
    pub operations: Vec<Operation>,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a bucket if it does not exist yet
    CreateBucket { name: Vec<u8> },

    /// Put a key-value pair into a bucket
    Put {
        bucket: Vec<u8>,
        key: Vec<u8>,
        value: Vec<u8>,
    },
}

/// A framed record as read back from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number, monotonically increasing
    pub lsn: u64,

    pub record: WalRecord,
}

impl WalRecord {
    pub fn new(operations: Vec<Operation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            timestamp,
            operations,
        }
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Payload length as stored in the frame header
///
/// Rejects payloads the 32-bit length field cannot hold.
pub(crate) fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        BatchError::InvalidEntry(format!(
            "commit record too large: {} bytes (limit {})",
            len,
            u32::MAX
        ))
    })
}

/// Frame a payload: [lsn][crc][len][data]
pub(crate) fn frame(lsn: u64, data: &[u8]) -> Result<Vec<u8>> {
    let len = frame_len(data.len())?;
    let mut out = Vec::with_capacity(HEADER_SIZE + data.len());
    out.extend_from_slice(&lsn.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(data);
    Ok(out)
}
