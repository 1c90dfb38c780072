//! BatchWriter
//!
//! Buffer plus flusher, with the automatic trigger policy: a put that takes
//! the buffer past its threshold flushes before returning.

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::config::Config;
use crate::flusher::{BatchFlusher, CommitReport, FlushError, FlushOutcome, FlushStats};
use crate::store::Store;

/// Progress of a writer: what is durable and what is still buffered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub batches_committed: u64,
    pub entries_committed: u64,
    pub pending: usize,
}

/// Single-writer batched write path
pub struct BatchWriter<S: Store> {
    buffer: WriteBuffer,
    flusher: BatchFlusher<S>,
}

impl<S: Store> BatchWriter<S> {
    /// Writer into `bucket` using the threshold and policies of `config`
    pub fn new(store: S, bucket: impl Into<Bytes>, config: &Config) -> Self {
        Self {
            buffer: WriteBuffer::new(config.flush_threshold),
            flusher: BatchFlusher::from_config(store, bucket, config),
        }
    }

    /// Writer from an already configured buffer and flusher
    pub fn from_parts(buffer: WriteBuffer, flusher: BatchFlusher<S>) -> Self {
        Self { buffer, flusher }
    }

    /// Buffer an entry, flushing if the threshold is now exceeded
    ///
    /// Returns the commit report when this put triggered a flush.
    pub fn put(
        &mut self,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Result<Option<CommitReport>, FlushError> {
        self.buffer.put(key, value);

        if !self.buffer.needs_flush() {
            return Ok(None);
        }
        Ok(self.flusher.flush(&mut self.buffer)?.report())
    }

    /// Force a flush of whatever is buffered
    pub fn flush(&mut self) -> Result<FlushOutcome, FlushError> {
        self.flusher.flush(&mut self.buffer)
    }

    /// Flush the remainder and return the final summary
    pub fn finish(mut self) -> Result<WriteSummary, FlushError> {
        self.flush()?;
        Ok(self.stats())
    }

    /// Entries buffered but not yet committed
    pub fn pending(&self) -> usize {
        self.buffer.size()
    }

    pub fn stats(&self) -> WriteSummary {
        let FlushStats {
            batches_committed,
            entries_committed,
            ..
        } = self.flusher.stats();
        WriteSummary {
            batches_committed,
            entries_committed,
            pending: self.buffer.size(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.buffer.threshold()
    }

    pub fn flusher(&self) -> &BatchFlusher<S> {
        &self.flusher
    }

    pub fn store(&self) -> &S {
        self.flusher.store()
    }
}
