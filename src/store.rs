//! Keyed record storage shared by the credential and metadata stores.
//!
//! Each store owns a single reader/writer lock over its whole map: any number
//! of readers proceed together, a writer excludes everyone else for the
//! duration of its mutation. Values are cloned out, so a caller never sees a
//! record mid-write and no guard outlives the call.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Backend contract for a string-keyed record map.
///
/// `InMemoryStore` is the only implementation today; a persistent backend can
/// satisfy the same trait without touching the HTTP layer.
pub trait RecordStore<V>: Send + Sync {
    /// Insert or replace, returning the previous value.
    fn put(&self, key: String, value: V) -> Option<V>;

    /// Insert only if `key` is absent. Returns `false` if it already existed.
    fn insert_new(&self, key: String, value: V) -> bool;

    fn get(&self, key: &str) -> Option<V>;

    /// Snapshot of every value, in no particular order.
    fn list(&self) -> Vec<V>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-memory record map. Contents are lost on restart.
pub struct InMemoryStore<V> {
    records: RwLock<HashMap<String, V>>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> RecordStore<V> for InMemoryStore<V> {
    fn put(&self, key: String, value: V) -> Option<V> {
        self.records.write().insert(key, value)
    }

    fn insert_new(&self, key: String, value: V) -> bool {
        let mut records = self.records.write();
        if records.contains_key(&key) {
            return false;
        }
        records.insert(key, value);
        true
    }

    fn get(&self, key: &str) -> Option<V> {
        self.records.read().get(key).cloned()
    }

    fn list(&self) -> Vec<V> {
        self.records.read().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.records.read().len()
    }
}
