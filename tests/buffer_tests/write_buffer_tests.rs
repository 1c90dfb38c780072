//! Tests for WriteBuffer and Batch
//!
//! These tests verify:
//! - Last write wins within the buffer
//! - Threshold boundary (T entries no flush, T+1 flush)
//! - Drain empties the buffer
//! - Restore keeps newer values

use std::collections::HashMap;

use batchkv::buffer::{Batch, WriteBuffer};
use bytes::Bytes;
use proptest::prelude::*;

// =============================================================================
// Put / Size Tests
// =============================================================================

#[test]
fn test_new_buffer_is_empty() {
    let buffer = WriteBuffer::new(10);
    assert!(buffer.is_empty());
    assert_eq!(buffer.size(), 0);
    assert_eq!(buffer.threshold(), 10);
    assert!(!buffer.needs_flush());
}

#[test]
fn test_put_counts_distinct_keys() {
    let mut buffer = WriteBuffer::new(10);
    buffer.put("0", "00000");
    buffer.put("1", "11111");
    buffer.put("2", "22222");

    assert_eq!(buffer.size(), 3);
}

#[test]
fn test_overwrite_keeps_latest_value() {
    let mut buffer = WriteBuffer::new(10);
    buffer.put("5", "A");
    buffer.put("5", "B");

    assert_eq!(buffer.size(), 1);
    let batch = buffer.drain();
    assert_eq!(batch.get(b"5"), Some(&Bytes::from_static(b"B")));
}

// =============================================================================
// Threshold Tests
// =============================================================================

#[test]
fn test_threshold_boundary() {
    let mut buffer = WriteBuffer::new(3);
    for i in 0..3 {
        buffer.put(i.to_string(), "v");
    }
    assert!(!buffer.needs_flush(), "T entries must not need a flush");

    buffer.put("3", "v");
    assert!(buffer.needs_flush(), "T+1 entries must need a flush");
}

#[test]
fn test_overwrite_does_not_cross_threshold() {
    let mut buffer = WriteBuffer::new(1);
    buffer.put("k", "1");
    buffer.put("k", "2");
    buffer.put("k", "3");
    assert!(!buffer.needs_flush());
}

#[test]
fn test_zero_threshold_flushes_at_first_put() {
    let mut buffer = WriteBuffer::new(0);
    assert!(!buffer.needs_flush());
    buffer.put("k", "v");
    assert!(buffer.needs_flush());
}

// =============================================================================
// Drain / Restore Tests
// =============================================================================

#[test]
fn test_drain_twice() {
    let mut buffer = WriteBuffer::new(10);
    buffer.put("0", "00000");
    buffer.put("1", "11111");

    let first = buffer.drain();
    assert_eq!(first.len(), 2);
    assert!(buffer.is_empty());

    let second = buffer.drain();
    assert!(second.is_empty());
}

#[test]
fn test_restore_into_empty_buffer() {
    let mut buffer = WriteBuffer::new(10);
    buffer.put("a", "1");
    buffer.put("b", "2");
    let batch = buffer.drain();

    buffer.restore(batch);
    assert_eq!(buffer.size(), 2);
}

#[test]
fn test_restore_keeps_newer_values() {
    let mut buffer = WriteBuffer::new(10);
    buffer.put("a", "old");
    buffer.put("b", "old");
    let batch = buffer.drain();

    buffer.put("a", "new");
    buffer.restore(batch);

    let restored = buffer.drain();
    assert_eq!(restored.len(), 2);
    assert_eq!(restored.get(b"a"), Some(&Bytes::from_static(b"new")));
    assert_eq!(restored.get(b"b"), Some(&Bytes::from_static(b"old")));
}

#[test]
fn test_batch_from_iterator_keeps_last_value() {
    let batch: Batch = vec![("k", "1"), ("j", "x"), ("k", "2")].into_iter().collect();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.get(b"k"), Some(&Bytes::from_static(b"2")));
    assert_eq!(batch.payload_bytes(), 4);
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #[test]
    fn prop_drain_matches_last_writes(
        writes in prop::collection::vec((0u8..32, any::<u16>()), 0..200),
        threshold in 0usize..64,
    ) {
        let mut buffer = WriteBuffer::new(threshold);
        let mut model: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

        for (key, value) in &writes {
            let key = vec![*key];
            let value = value.to_le_bytes().to_vec();
            buffer.put(key.clone(), value.clone());
            model.insert(key, value);
            prop_assert_eq!(buffer.needs_flush(), model.len() > threshold);
        }

        let batch = buffer.drain();
        prop_assert_eq!(batch.len(), model.len());
        for (key, value) in &model {
            prop_assert_eq!(batch.get(key).map(|v| v.to_vec()), Some(value.clone()));
        }
        prop_assert!(buffer.is_empty());
    }
}
