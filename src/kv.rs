//! Minimal ordered key-value capability the core requires from a backend.
//!
//! A concrete engine adapter (embedded KV store, B-tree, on-disk index)
//! implements [`KvIndex`] twice per logical store: once for the forward index
//! and once for the inverse index. The core owns key and payload encoding;
//! the backend owns physical storage and must honor byte-lexicographic
//! ordering for the ranges it is given.

use crate::error::StoreError;

/// Iterator over `(key, value)` entries in byte-lexicographic key order.
pub type KvEntries<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'a>;

/// An ordered byte-keyed map.
pub trait KvIndex {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert or replace.
    fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError>;

    /// Remove if present; absence is not an error.
    fn remove(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`, in key order. An empty
    /// prefix scans the whole index.
    fn scan_prefix<'a>(&'a self, prefix: &[u8]) -> Result<KvEntries<'a>, StoreError>;

    /// Discard every entry.
    fn clear(&mut self) -> Result<(), StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory reference backend over a `BTreeMap`. Used by tests and as the
/// model implementation for the ordering contract.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    map: std::collections::BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        MemoryIndex::default()
    }

    /// Build from entries already in nondecreasing key order, as produced by
    /// the bulk index builder.
    pub fn from_sorted(entries: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
        MemoryIndex {
            map: entries.into_iter().collect(),
        }
    }
}

impl KvIndex for MemoryIndex {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.map.get(key).cloned())
    }

    fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.map.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.map.remove(key);
        Ok(())
    }

    fn scan_prefix<'a>(&'a self, prefix: &[u8]) -> Result<KvEntries<'a>, StoreError> {
        let prefix = prefix.to_vec();
        let start = prefix.clone();
        Ok(Box::new(
            self.map
                .range(start..)
                .take_while(move |(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| Ok((k.clone(), v.clone()))),
        ))
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.map.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}
