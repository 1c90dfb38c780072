//! WriteBuffer implementation
//!
//! HashMap-based buffer with a count threshold.

use std::collections::HashMap;

use bytes::Bytes;

use super::Batch;

/// In-memory mapping of pending writes, bounded by a flush threshold
///
/// The buffer never flushes itself. `needs_flush()` reports when the size
/// exceeds the threshold and the owner decides what to do about it.
#[derive(Debug)]
pub struct WriteBuffer {
    /// Pending entries, last write wins
    entries: HashMap<Bytes, Bytes>,

    /// Entry count above which a flush is needed
    threshold: usize,
}

impl WriteBuffer {
    /// Create an empty buffer with the given flush threshold
    pub fn new(threshold: usize) -> Self {
        Self {
            entries: HashMap::new(),
            threshold,
        }
    }

    /// Insert or overwrite an entry
    pub fn put(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Current entry count
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Alias of `size()`
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured flush threshold
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// True once the size is strictly greater than the threshold
    ///
    /// With threshold T, T entries do not need a flush; T+1 do.
    pub fn needs_flush(&self) -> bool {
        self.entries.len() > self.threshold
    }

    /// Take every pending entry, leaving the buffer empty
    pub fn drain(&mut self) -> Batch {
        Batch::from_map(std::mem::take(&mut self.entries))
    }

    /// Put undelivered entries back after a failed flush
    ///
    /// Keys written again since the drain keep their newer value.
    pub fn restore(&mut self, batch: Batch) {
        if self.entries.is_empty() {
            self.entries = batch.into_map();
            return;
        }
        for (key, value) in batch {
            self.entries.entry(key).or_insert(value);
        }
    }
}
