//! In-process slice store

use dashmap::DashMap;
use serde_json::Value;
use wizard_core::{SliceError, SliceStore};

/// Page-scoped slice store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemorySliceStore {
    slices: DashMap<String, Value>,
}

impl InMemorySliceStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored slices
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Check if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Drop a slice
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.slices.remove(key).map(|(_, v)| v)
    }
}

impl SliceStore for InMemorySliceStore {
    fn persist_slice(&self, key: &str, value: Value) -> Result<(), SliceError> {
        self.slices.insert(key.to_string(), value);
        Ok(())
    }

    fn read_slice(&self, key: &str) -> Option<Value> {
        self.slices.get(key).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn persist_read_remove() {
        let store = InMemorySliceStore::new();
        store.persist_slice("pricing.freeze", json!({"powerKw": 100})).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.read_slice("pricing.freeze"), Some(json!({"powerKw": 100})));
        assert!(store.remove("pricing.freeze").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn patch_merges_shallowly() {
        let store = InMemorySliceStore::new();
        store.persist_slice("s", json!({"a": 1, "b": {"x": 1}})).unwrap();
        store.patch_slice("s", json!({"b": {"y": 2}, "c": 3})).unwrap();
        assert_eq!(store.read_slice("s"), Some(json!({"a": 1, "b": {"y": 2}, "c": 3})));
        assert!(matches!(
            store.patch_slice("s", json!(5)),
            Err(SliceError::NotAnObject(_))
        ));
    }
}
