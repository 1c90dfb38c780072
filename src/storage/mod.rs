//! Storage Module
//!
//! Sorted table files that DiskStore checkpoints its memtable into.
//!
//! ## Responsibilities
//! - Persist checkpointed commits to disk in sorted format
//! - Point lookups through an in-memory index
//! - Discover existing table files on open
//!
//! No compaction: table files accumulate, newest shadowing oldest.

mod manager;
mod sstable;

pub use manager::StorageManager;
pub use sstable::{SSTable, SSTableBuilder, SSTableReader};
