//! Two-tier cache store.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{CacheError, DurableStore, FastCache};

/// Fast-cache key marking a completed preload.
///
/// Written last so an interrupted preload is retried by the next process.
pub const PRELOAD_SENTINEL_KEY: &str = "kiln.cache.preloaded";

/// Options for a [`CacheStore`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Directory for durable cache files.
    pub dir: PathBuf,
    /// Whether the fast backend may be used.
    pub fast: bool,
    /// Whether [`CacheStore::preload`] replays the durable store.
    pub preload: bool,
}

impl CacheOptions {
    /// Creates options with the fast path and preload disabled.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fast: false,
            preload: false,
        }
    }

    /// Sets whether the fast backend may be used.
    pub fn fast(mut self, enabled: bool) -> Self {
        self.fast = enabled;
        self
    }

    /// Sets whether preload is enabled.
    pub fn preload(mut self, enabled: bool) -> Self {
        self.preload = enabled;
        self
    }
}

/// Key/value store with an optional fast backend and a durable disk backend.
pub struct CacheStore {
    durable: DurableStore,
    fast: Option<Arc<dyn FastCache>>,
    options: CacheOptions,
}

impl CacheStore {
    /// Creates a store without a fast backend.
    pub fn new(options: CacheOptions) -> Self {
        Self {
            durable: DurableStore::new(options.dir.clone()),
            fast: None,
            options,
        }
    }

    /// Attaches a fast backend.
    pub fn with_fast_backend(mut self, backend: Arc<dyn FastCache>) -> Self {
        self.fast = Some(backend);
        self
    }

    /// Returns the durable backend.
    pub fn durable(&self) -> &DurableStore {
        &self.durable
    }

    /// Returns whether reads and writes go to the fast backend.
    ///
    /// Requires the enable flag, an attached backend, and that backend's
    /// runtime capability check.
    pub fn is_fast_enabled(&self) -> bool {
        self.active_fast().is_some()
    }

    fn active_fast(&self) -> Option<&Arc<dyn FastCache>> {
        if !self.options.fast {
            return None;
        }
        self.fast.as_ref().filter(|backend| backend.is_available())
    }

    /// Reads `key` from the fast backend, falling back to `default`.
    ///
    /// With the fast path disabled this always returns `default`; callers are
    /// expected to consult [`CacheStore::load_encoded`] themselves.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(fast) = self.active_fast() else {
            return default;
        };

        match fast.fetch(key) {
            Some(value) => match serde_json::from_value(value) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("Ignoring undecodable fast cache value for '{}': {}", key, e);
                    default
                }
            },
            None => default,
        }
    }

    /// Writes `key` to the fast backend.
    ///
    /// A rejected write is an error: once enabled, the fast backend must accept
    /// every write. Without a fast backend this is a no-op.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let Some(fast) = self.active_fast() else {
            debug!("Fast cache disabled, not storing '{}'", key);
            return Ok(());
        };

        let value = serde_json::to_value(value)?;
        if !fast.store(key, value) {
            return Err(CacheError::write(key, "fast cache rejected the write"));
        }
        Ok(())
    }

    /// Persists `key` to the durable store, and to the fast backend when enabled.
    pub fn save_encoded<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        self.durable.write(key, &value)?;

        if let Some(fast) = self.active_fast()
            && !fast.store(key, value)
        {
            return Err(CacheError::write(key, "fast cache rejected the write"));
        }

        Ok(())
    }

    /// Reads `key` from the durable store.
    pub fn load_encoded<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.durable.read(key)? {
            Some(value) => {
                let decoded = serde_json::from_value(value)
                    .map_err(|e| CacheError::corrupted(self.durable.path_for(key), e.to_string()))?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    /// Removes `key` from both backends.
    pub fn delete(&self, key: &str) -> Result<(), CacheError> {
        if let Some(fast) = self.active_fast() {
            fast.delete(key);
        }
        self.durable.remove(key)?;
        Ok(())
    }

    /// Clears both backends. Returns the number of durable files removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        if let Some(fast) = self.active_fast() {
            fast.clear();
        }
        let removed = self.durable.clear()?;
        info!(
            "Cleared {} cache files from {}",
            removed,
            self.durable.dir().display()
        );
        Ok(removed)
    }

    /// Replays the durable store into the fast backend, once per deployment.
    ///
    /// Returns the number of entries loaded. Does nothing unless preload is
    /// enabled and the fast backend is active, or when the sentinel key shows
    /// a previous preload already completed.
    pub fn preload(&self) -> Result<usize, CacheError> {
        if !self.options.preload {
            return Ok(0);
        }
        let Some(fast) = self.active_fast() else {
            return Ok(0);
        };
        if fast.fetch(PRELOAD_SENTINEL_KEY).is_some() {
            debug!("Fast cache already preloaded");
            return Ok(0);
        }

        let entries = self.durable.entries()?;
        let count = entries.len();
        for entry in entries {
            if !fast.store(&entry.key, entry.value) {
                return Err(CacheError::write(entry.key, "fast cache rejected the write"));
            }
        }

        if !fast.store(PRELOAD_SENTINEL_KEY, Value::Bool(true)) {
            return Err(CacheError::write(
                PRELOAD_SENTINEL_KEY,
                "fast cache rejected the write",
            ));
        }

        info!("Preloaded {} cache entries", count);
        Ok(count)
    }
}
