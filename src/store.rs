/// The in-memory key-value store
///
/// Single-writer-at-a-time mapping from key to `(value, stamp)`. All
/// mutations happen under the replication engine's coordination lock
/// (see [`crate::engine`]); this type itself has no internal locking.
use crate::clock::VectorClock;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A stored entry: the value together with the vector clock in effect
/// at the moment it was installed.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub value: JsonValue,
    pub stamp: VectorClock,
}

/// The local key-value mapping.
#[derive(Debug, Default)]
pub struct KvStore {
    entries: HashMap<String, StoredEntry>,
}

impl KvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Look up the current entry for `key`.
    pub fn get(&self, key: &str) -> Option<&StoredEntry> {
        self.entries.get(key)
    }

    /// Install a value, unconditionally overwriting any prior entry for
    /// `key`. No merge of concurrent values is performed — the
    /// locally-delivered order is authoritative.
    pub fn put(&mut self, key: impl Into<String>, value: JsonValue, stamp: VectorClock) {
        self.entries.insert(key.into(), StoredEntry { value, stamp });
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the full key set, for the `/status` surface.
    pub fn snapshot(&self) -> HashMap<String, StoredEntry> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use serde_json::json;

    #[test]
    fn put_then_get_round_trips() {
        let mut store = KvStore::new();
        let n0 = NodeId::new("n0");
        let stamp = VectorClock::zero(&[n0]);
        store.put("hello", json!("world"), stamp.clone());

        let entry = store.get("hello").unwrap();
        assert_eq!(entry.value, json!("world"));
        assert_eq!(entry.stamp, stamp);
    }

    #[test]
    fn put_overwrites_without_merging() {
        let mut store = KvStore::new();
        let n0 = NodeId::new("n0");
        let mut stamp = VectorClock::zero(&[n0.clone()]);
        store.put("k", json!(1), stamp.clone());
        stamp.increment(&n0);
        store.put("k", json!(2), stamp.clone());

        let entry = store.get("k").unwrap();
        assert_eq!(entry.value, json!(2));
        assert_eq!(entry.stamp, stamp);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_key_returns_none() {
        let store = KvStore::new();
        assert!(store.get("nope").is_none());
    }
}
