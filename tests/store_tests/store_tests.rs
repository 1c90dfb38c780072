//! Tests for MemoryStore and DiskStore
//!
//! These tests verify:
//! - Committed values read back exactly (last value wins)
//! - Missing buckets and invalid entries reject the whole commit
//! - DiskStore persistence across reopen
//! - Torn log tails are discarded without losing earlier commits
//! - Checkpointing keeps data readable

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::thread;

use batchkv::buffer::Batch;
use batchkv::config::{Config, SyncPolicy};
use batchkv::store::{DiskStore, MemoryStore, Store, MAX_KEY_SIZE};
use batchkv::BatchError;
use tempfile::TempDir;

const BUCKET: &[u8] = b"MyBucket";

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_batch() -> Batch {
    vec![("0", "00000"), ("1", "11111"), ("2", "22222")]
        .into_iter()
        .collect()
}

fn open_disk(dir: &TempDir) -> DiskStore {
    DiskStore::open_path(dir.path()).unwrap()
}

/// Checks shared by both implementations
fn check_round_trip<S: Store>(store: &S) {
    store.create_bucket(BUCKET).unwrap();

    let info = store.commit(BUCKET, &sample_batch()).unwrap();
    assert_eq!(info.entries, 3);

    assert_eq!(store.get(BUCKET, b"0").unwrap(), Some(b"00000".to_vec()));
    assert_eq!(store.get(BUCKET, b"1").unwrap(), Some(b"11111".to_vec()));
    assert_eq!(store.get(BUCKET, b"2").unwrap(), Some(b"22222".to_vec()));
    assert_eq!(store.get(BUCKET, b"3").unwrap(), None);

    let mut overwrite = Batch::new();
    overwrite.insert("1", "B");
    let next = store.commit(BUCKET, &overwrite).unwrap();
    assert!(next.sequence > info.sequence);
    assert_eq!(store.get(BUCKET, b"1").unwrap(), Some(b"B".to_vec()));
}

fn check_missing_bucket<S: Store>(store: &S) {
    let err = store.commit(b"nope", &sample_batch()).unwrap_err();
    assert!(matches!(err, BatchError::BucketNotFound(_)));
    assert!(!err.is_retryable());

    assert!(matches!(
        store.get(b"nope", b"0"),
        Err(BatchError::BucketNotFound(_))
    ));
}

fn check_invalid_entry_rejects_whole_batch<S: Store>(store: &S) {
    store.create_bucket(BUCKET).unwrap();

    let mut batch = sample_batch();
    batch.insert("", "empty key");
    let err = store.commit(BUCKET, &batch).unwrap_err();
    assert!(matches!(err, BatchError::InvalidEntry(_)));
    assert!(!err.is_retryable());

    // Nothing from the rejected batch was written
    assert_eq!(store.get(BUCKET, b"0").unwrap(), None);

    let mut oversize = Batch::new();
    oversize.insert(vec![b'k'; MAX_KEY_SIZE + 1], "v");
    assert!(matches!(
        store.commit(BUCKET, &oversize),
        Err(BatchError::InvalidEntry(_))
    ));
}

fn check_bucket_names<S: Store>(store: &S) {
    assert!(matches!(
        store.create_bucket(b""),
        Err(BatchError::InvalidEntry(_))
    ));

    store.create_bucket(b"a").unwrap();
    store.create_bucket(b"a").unwrap();
    store.create_bucket(b"b").unwrap();

    let mut in_a = Batch::new();
    in_a.insert("k", "from a");
    store.commit(b"a", &in_a).unwrap();

    assert_eq!(store.get(b"a", b"k").unwrap(), Some(b"from a".to_vec()));
    assert_eq!(store.get(b"b", b"k").unwrap(), None);
}

// =============================================================================
// MemoryStore Tests
// =============================================================================

#[test]
fn test_memory_round_trip() {
    let store = MemoryStore::new();
    check_round_trip(&store);
    assert_eq!(store.commit_count(), 2);
    assert_eq!(store.bucket_len(BUCKET), Some(3));
}

#[test]
fn test_memory_missing_bucket() {
    check_missing_bucket(&MemoryStore::new());
}

#[test]
fn test_memory_invalid_entry() {
    let store = MemoryStore::new();
    check_invalid_entry_rejects_whole_batch(&store);
    assert_eq!(store.commit_count(), 0);
}

#[test]
fn test_memory_buckets_are_separate() {
    let store = MemoryStore::new();
    check_bucket_names(&store);
    assert_eq!(store.bucket_len(b"b"), Some(0));
    assert_eq!(store.bucket_len(b"c"), None);
}

#[test]
fn test_memory_concurrent_commits() {
    let store = Arc::new(MemoryStore::new());
    store.create_bucket(BUCKET).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    let mut batch = Batch::new();
                    batch.insert(format!("{}-{}", t, i), "v");
                    store.commit(BUCKET, &batch).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.commit_count(), 200);
    assert_eq!(store.bucket_len(BUCKET), Some(200));
}

// =============================================================================
// DiskStore Tests
// =============================================================================

#[test]
fn test_disk_round_trip() {
    let dir = TempDir::new().unwrap();
    check_round_trip(&open_disk(&dir));
}

#[test]
fn test_disk_missing_bucket() {
    let dir = TempDir::new().unwrap();
    check_missing_bucket(&open_disk(&dir));
}

#[test]
fn test_disk_invalid_entry_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_disk(&dir);
    check_invalid_entry_rejects_whole_batch(&store);

    // Only the bucket creation reached the log
    assert_eq!(store.last_lsn(), 1);
}

#[test]
fn test_disk_buckets_are_separate() {
    let dir = TempDir::new().unwrap();
    check_bucket_names(&open_disk(&dir));
}

#[test]
fn test_disk_open_creates_layout() {
    let dir = TempDir::new().unwrap();
    let store = open_disk(&dir);

    assert_eq!(store.data_dir(), dir.path());
    assert!(store.storage_dir().exists());
    assert!(dir.path().join("wal.log").exists());
    assert_eq!(store.sstable_count(), 0);
    assert_eq!(store.recovery().records_recovered, 0);
}

#[test]
fn test_disk_open_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        .sync_policy(SyncPolicy::EveryNCommits { count: 0 })
        .build();

    assert!(matches!(DiskStore::open(config), Err(BatchError::Config(_))));
}

#[test]
fn test_disk_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_disk(&dir);
        store.create_bucket(BUCKET).unwrap();
        store.commit(BUCKET, &sample_batch()).unwrap();
        // Dropped without close: recovered from the log
    }

    let store = open_disk(&dir);
    assert_eq!(store.recovery().records_recovered, 2);
    assert_eq!(store.recovery().operations_recovered, 4);
    assert_eq!(store.get(BUCKET, b"2").unwrap(), Some(b"22222".to_vec()));
    assert_eq!(store.sstable_count(), 1);
}

#[test]
fn test_disk_close_then_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_disk(&dir);
        store.create_bucket(BUCKET).unwrap();
        store.commit(BUCKET, &sample_batch()).unwrap();
        store.close().unwrap();
    }

    let store = open_disk(&dir);
    assert_eq!(store.recovery().records_recovered, 0);
    assert_eq!(store.get(BUCKET, b"0").unwrap(), Some(b"00000".to_vec()));

    // The bucket persisted too
    let mut more = Batch::new();
    more.insert("3", "33333");
    store.commit(BUCKET, &more).unwrap();
    assert_eq!(store.get(BUCKET, b"3").unwrap(), Some(b"33333".to_vec()));
}

#[test]
fn test_disk_torn_tail_keeps_earlier_commits() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_disk(&dir);
        store.create_bucket(BUCKET).unwrap();
        store.commit(BUCKET, &sample_batch()).unwrap();
    }

    // Simulate a crash in the middle of the next commit record
    let mut wal = OpenOptions::new()
        .append(true)
        .open(dir.path().join("wal.log"))
        .unwrap();
    wal.write_all(&[7u8; 10]).unwrap();
    drop(wal);

    let store = open_disk(&dir);
    assert!(store.recovery().was_truncated);
    assert_eq!(store.recovery().bytes_discarded, 10);
    assert_eq!(store.recovery().records_recovered, 2);
    assert_eq!(store.get(BUCKET, b"1").unwrap(), Some(b"11111".to_vec()));
}

#[test]
fn test_disk_failed_checkpoint_keeps_commit() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        .memtable_size_limit(1)
        .build();
    let store = DiskStore::open(config).unwrap();

    // A directory in the way of the temporary file fails the next two checkpoints
    for id in 1..=2 {
        let blocker = store.storage_dir().join(format!("sstable_{:06}.sst.tmp", id));
        std::fs::create_dir(blocker).unwrap();
    }

    store.create_bucket(BUCKET).unwrap();
    let info = store.commit(BUCKET, &sample_batch()).unwrap();
    assert_eq!(info.entries, 3);

    assert_eq!(store.sstable_count(), 0);
    assert!(store.memtable_entry_count() > 0);
    assert_eq!(store.get(BUCKET, b"1").unwrap(), Some(b"11111".to_vec()));

    let mut batch = Batch::new();
    batch.insert("3", "33333");
    store.commit(BUCKET, &batch).unwrap();

    assert_eq!(store.sstable_count(), 1);
    assert_eq!(store.memtable_entry_count(), 0);
    for (key, value) in [("0", "00000"), ("2", "22222"), ("3", "33333")] {
        assert_eq!(
            store.get(BUCKET, key.as_bytes()).unwrap(),
            Some(value.as_bytes().to_vec())
        );
    }

    drop(store);
    let store = open_disk(&dir);
    assert_eq!(store.sstable_count(), 1);
    assert_eq!(store.get(BUCKET, b"0").unwrap(), Some(b"00000".to_vec()));
}

#[test]
fn test_disk_checkpoint_keeps_data_readable() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        .memtable_size_limit(256)
        .build();
    let store = DiskStore::open(config).unwrap();
    store.create_bucket(BUCKET).unwrap();

    for chunk in 0..10 {
        let batch: Batch = (0..10)
            .map(|i| {
                let key = (chunk * 10 + i).to_string();
                let value = key.repeat(5);
                (key, value)
            })
            .collect();
        store.commit(BUCKET, &batch).unwrap();
    }

    assert!(store.sstable_count() >= 2);
    assert!(store.memtable_size() < 256);
    store.verify().unwrap();

    for i in 0..100 {
        let key = i.to_string();
        assert_eq!(
            store.get(BUCKET, key.as_bytes()).unwrap(),
            Some(key.repeat(5).into_bytes())
        );
    }
}

#[test]
fn test_disk_explicit_checkpoint() {
    let dir = TempDir::new().unwrap();
    let store = open_disk(&dir);
    store.create_bucket(BUCKET).unwrap();
    store.commit(BUCKET, &sample_batch()).unwrap();
    assert_eq!(store.memtable_entry_count(), 4);

    store.checkpoint().unwrap();
    assert_eq!(store.memtable_entry_count(), 0);
    assert_eq!(store.sstable_count(), 1);
    assert_eq!(std::fs::metadata(dir.path().join("wal.log")).unwrap().len(), 0);
    assert_eq!(store.get(BUCKET, b"0").unwrap(), Some(b"00000".to_vec()));

    // Nothing pending: no new table
    store.checkpoint().unwrap();
    assert_eq!(store.sstable_count(), 1);
}

#[test]
fn test_disk_concurrent_commits_serialize() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        .sync_policy(SyncPolicy::EveryNCommits { count: 16 })
        .commit_timeout_ms(10_000)
        .build();
    let store = Arc::new(DiskStore::open(config).unwrap());
    store.create_bucket(BUCKET).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..25)
                    .map(|i| {
                        let mut batch = Batch::new();
                        batch.insert(format!("{}-{}", t, i), "v");
                        store.commit(BUCKET, &batch).unwrap().sequence
                    })
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut sequences: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    sequences.sort_unstable();
    sequences.dedup();
    assert_eq!(sequences.len(), 100);
    assert_eq!(store.last_lsn(), 101);
}
