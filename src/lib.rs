//! # batchkv
//!
//! Batched writes over an embedded key-value store, with:
//! - A write buffer that accumulates pending entries in memory
//! - A flusher that commits them as one atomic transaction
//! - Retry with backoff, and undelivered entries handed back on failure
//! - A bounded worker pool that coalesces single writes
//! - A harness that compares strategies against a plain map
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Experiment / batchkv-bench                     │
//! └──────────────┬─────────────────────────────┬────────────────┘
//!                │                             │
//! ┌──────────────▼──────────────┐   ┌──────────▼──────────────┐
//! │         BatchWriter         │   │        Coalescer        │
//! │  WriteBuffer → BatchFlusher │   │  queue → N workers      │
//! └──────────────┬──────────────┘   └──────────┬──────────────┘
//!                │      Store::commit(batch)   │
//!                └──────────────┬──────────────┘
//!          ┌────────────────────┴────────────────────┐
//!          ▼                                         ▼
//!   ┌─────────────┐                         ┌─────────────────┐
//!   │ MemoryStore │                         │    DiskStore    │
//!   └─────────────┘                         │ WAL → MemTable  │
//!                                           │     → SSTables  │
//!                                           └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod buffer;
pub mod wal;
pub mod memtable;
pub mod storage;
pub mod store;
pub mod retry;
pub mod flusher;
pub mod writer;
pub mod coalescer;
pub mod experiment;

mod util;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use buffer::{Batch, WriteBuffer};
pub use coalescer::{Coalescer, CoalescerConfig};
pub use config::{Config, SyncPolicy};
pub use error::{BatchError, Result};
pub use flusher::{BatchFlusher, FailurePolicy, FlushError, FlushOutcome};
pub use retry::RetryPolicy;
pub use store::{DiskStore, MemoryStore, Store};
pub use writer::BatchWriter;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of batchkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
