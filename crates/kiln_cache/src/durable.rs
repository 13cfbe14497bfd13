//! Durable on-disk store.
//!
//! One file per key, named `<blake3(key)>.data`, holding a JSON envelope with
//! the original key so the directory can be replayed without a side index.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::CacheError;
use crate::fs::atomic_write;

/// Suffix of durable cache files.
const DATA_EXTENSION: &str = "data";

/// On-disk representation of a cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    /// Logical cache key.
    pub key: String,
    /// Stored value.
    pub value: Value,
}

/// Directory-backed key/value store.
#[derive(Debug, Clone)]
pub struct DurableStore {
    dir: PathBuf,
}

impl DurableStore {
    /// Creates a store rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Computes the BLAKE3 hash of a key.
    pub fn hash_key(key: &str) -> String {
        blake3::hash(key.as_bytes()).to_hex().to_string()
    }

    /// Returns the file that holds `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", Self::hash_key(key), DATA_EXTENSION))
    }

    /// Writes `value` under `key` with temp-file-then-rename.
    pub fn write(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            CacheError::write(key, format!("cannot create {}: {}", self.dir.display(), e))
        })?;

        let stored = StoredValue {
            key: key.to_string(),
            value: value.clone(),
        };
        let bytes = serde_json::to_vec(&stored)?;
        let path = self.path_for(key);

        atomic_write(&path, &bytes).map_err(|e| CacheError::write(key, e.to_string()))?;
        debug!("Wrote cache file {} for '{}'", path.display(), key);

        Ok(())
    }

    /// Reads the value stored under `key`, if any.
    pub fn read(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let stored = Self::read_file(&path)?;
        if stored.key != key {
            return Err(CacheError::corrupted(
                &path,
                format!("holds key '{}', expected '{}'", stored.key, key),
            ));
        }

        Ok(Some(stored.value))
    }

    /// Removes the file for `key`. Returns `true` if it existed.
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes every cache file. Returns the number of files removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for path in self.data_files()? {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Reads every well-formed entry in the directory.
    ///
    /// Files that fail to decode, or whose name does not match the hash of the
    /// key they hold, are skipped with a warning.
    pub fn entries(&self) -> Result<Vec<StoredValue>, CacheError> {
        let mut entries = Vec::new();

        for path in self.data_files()? {
            let stored = match Self::read_file(&path) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Skipping cache file: {}", e);
                    continue;
                }
            };

            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            if stem != Self::hash_key(&stored.key) {
                warn!(
                    "Skipping cache file {}: name does not match key '{}'",
                    path.display(),
                    stored.key
                );
                continue;
            }

            entries.push(stored);
        }

        Ok(entries)
    }

    /// Lists files matching the `<64 hex chars>.data` naming pattern.
    fn data_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && is_data_file_name(&path) {
                files.push(path);
            }
        }
        files.sort();

        Ok(files)
    }

    fn read_file(path: &Path) -> Result<StoredValue, CacheError> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| CacheError::corrupted(path, e.to_string()))
    }
}

fn is_data_file_name(path: &Path) -> bool {
    let is_data = path.extension().and_then(|e| e.to_str()) == Some(DATA_EXTENSION);
    let stem_ok = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()));
    is_data && stem_ok
}
