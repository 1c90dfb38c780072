//! Batch of drained entries
//!
//! The unit handed to `Store::commit`.

use std::collections::hash_map::{self, HashMap};

use bytes::Bytes;

/// A set of entries committed together as one atomic transaction
///
/// Keys are unique; building a batch from an iterator keeps the last value
/// seen for each key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    entries: HashMap<Bytes, Bytes>,
}

impl Batch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(entries: HashMap<Bytes, Bytes>) -> Self {
        Self { entries }
    }

    pub(crate) fn into_map(self) -> HashMap<Bytes, Bytes> {
        self.entries
    }

    /// Insert or overwrite an entry
    pub fn insert(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the value for a key
    pub fn get(&self, key: &[u8]) -> Option<&Bytes> {
        self.entries.get(key)
    }

    /// Iterate over entries (no ordering guarantee)
    pub fn iter(&self) -> hash_map::Iter<'_, Bytes, Bytes> {
        self.entries.iter()
    }

    pub fn keys(&self) -> hash_map::Keys<'_, Bytes, Bytes> {
        self.entries.keys()
    }

    /// Total size of all keys and values in bytes
    pub fn payload_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl IntoIterator for Batch {
    type Item = (Bytes, Bytes);
    type IntoIter = hash_map::IntoIter<Bytes, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = (&'a Bytes, &'a Bytes);
    type IntoIter = hash_map::Iter<'a, Bytes, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Batch
where
    K: Into<Bytes>,
    V: Into<Bytes>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut batch = Batch::new();
        for (key, value) in iter {
            batch.insert(key, value);
        }
        batch
    }
}
