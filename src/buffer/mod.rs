//! Write Buffer Module
//!
//! In-memory accumulation of pending writes before they are committed.
//!
//! ## Responsibilities
//! - Hold pending key/value pairs, last write wins per key
//! - Report when the flush threshold has been crossed
//! - Hand its whole contents to the flusher as one `Batch`
//!
//! The buffer cannot fail; it is pure in-memory state owned by one writer.

mod batch;
mod write_buffer;

pub use batch::Batch;
pub use write_buffer::WriteBuffer;
