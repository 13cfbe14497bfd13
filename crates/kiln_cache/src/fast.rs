//! Fast cache backends.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

/// A low-latency key/value backend layered in front of the durable store.
///
/// Implementations must be shareable between request handlers.
pub trait FastCache: Send + Sync {
    /// Runtime capability check. An unavailable backend is never used.
    fn is_available(&self) -> bool {
        true
    }

    /// Fetches a value.
    fn fetch(&self, key: &str) -> Option<Value>;

    /// Stores a value. Returns `false` if the backend rejected the write.
    fn store(&self, key: &str, value: Value) -> bool;

    /// Removes a value. Returns `true` if it was present.
    fn delete(&self, key: &str) -> bool;

    /// Removes every value.
    fn clear(&self);
}

/// In-process fast cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl FastCache for MemoryCache {
    fn fetch(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn store(&self, key: &str, value: Value) -> bool {
        self.entries.write().insert(key.to_string(), value);
        true
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}
