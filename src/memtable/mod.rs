//! MemTable Module
//!
//! In-memory table of committed writes not yet checkpointed.
//!
//! ## Responsibilities
//! - Serve reads of recent commits
//! - Single-writer/multi-reader access pattern
//! - Track size for checkpoint triggers
//! - Ordered iteration for SSTable creation
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in RwLock:
//! - Ordered keys (required for SSTable generation)
//! - Simple and correct first

mod table;

pub use table::MemTable;
