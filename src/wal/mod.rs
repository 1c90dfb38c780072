//! Write-Ahead Log (WAL) Module
//!
//! Durable commit log for DiskStore. One record per commit.
//!
//! ## Responsibilities
//! - Append one record per committed batch before it becomes visible
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Crash recovery: replay whole records, discard a torn tail
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! A record is the atomic unit: it is either read back whole with a
//! matching CRC, or it and everything after it is discarded.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, WalRecord, HEADER_SIZE};
pub use reader::WalReader;
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
