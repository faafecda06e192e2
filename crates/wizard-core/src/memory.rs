//! Page-scoped key/value side store
//!
//! Pricing and navigation publish intermediate results here (load profile,
//! pricing freeze, session snapshot) so downstream consumers can read them
//! even when a later stage fails.

use serde_json::{Map, Value};

/// Load profile written right after the physical layer
pub const LOAD_PROFILE_SLICE: &str = "pricing.loadProfile";
/// Frozen inputs of the latest pricing run
pub const PRICING_FREEZE_SLICE: &str = "pricing.freeze";
/// Serialized wizard state used for resume
pub const SNAPSHOT_SLICE: &str = "wizard.snapshot";

/// Side store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SliceError {
    /// Patch target or patch is not a JSON object
    #[error("slice {0} is not an object")]
    NotAnObject(String),

    /// Backend refused the write
    #[error("slice backend error: {0}")]
    Backend(String),
}

/// Key/value slot store
pub trait SliceStore: Send + Sync {
    /// Replace a slice
    ///
    /// # Errors
    /// Returns [`SliceError::Backend`] when the write is refused.
    fn persist_slice(&self, key: &str, value: Value) -> Result<(), SliceError>;

    /// Read a slice
    fn read_slice(&self, key: &str) -> Option<Value>;

    /// Shallow-merge an object into a slice, creating it when absent
    ///
    /// # Errors
    /// Returns [`SliceError::NotAnObject`] when either side is not an object.
    fn patch_slice(&self, key: &str, patch: Value) -> Result<(), SliceError> {
        let Value::Object(patch) = patch else {
            return Err(SliceError::NotAnObject(key.to_string()));
        };
        let mut merged = match self.read_slice(key) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(existing)) => existing,
            Some(_) => return Err(SliceError::NotAnObject(key.to_string())),
        };
        merged.extend(patch);
        self.persist_slice(key, Value::Object(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, Value>>);

    impl SliceStore for MapStore {
        fn persist_slice(&self, key: &str, value: Value) -> Result<(), SliceError> {
            self.0.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        fn read_slice(&self, key: &str) -> Option<Value> {
            self.0.lock().unwrap().get(key).cloned()
        }
    }

    #[test]
    fn patch_merges_objects() {
        let store = MapStore::default();
        store
            .persist_slice(LOAD_PROFILE_SLICE, json!({"baseLoadKW": 40.0, "peakLoadKW": 90.0}))
            .unwrap();
        store
            .patch_slice(LOAD_PROFILE_SLICE, json!({"peakLoadKW": 120.0}))
            .unwrap();
        assert_eq!(
            store.read_slice(LOAD_PROFILE_SLICE),
            Some(json!({"baseLoadKW": 40.0, "peakLoadKW": 120.0}))
        );
    }

    #[test]
    fn patch_creates_missing_slice() {
        let store = MapStore::default();
        store.patch_slice("ui", json!({"seen": true})).unwrap();
        assert_eq!(store.read_slice("ui"), Some(json!({"seen": true})));
    }

    #[test]
    fn patch_rejects_scalars() {
        let store = MapStore::default();
        store.persist_slice("n", json!(3)).unwrap();
        assert_eq!(
            store.patch_slice("n", json!({"a": 1})),
            Err(SliceError::NotAnObject("n".into()))
        );
        assert!(store.patch_slice("m", json!(1)).is_err());
    }
}
