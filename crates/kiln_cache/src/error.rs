//! Cache error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The fast backend refused a write, or a durable write failed.
    ///
    /// Treated as fatal: preload assumes every accepted write is readable.
    #[error("Cache write failed for key '{key}': {reason}")]
    Write {
        /// Logical cache key.
        key: String,
        /// Description of the failure.
        reason: String,
    },

    /// A durable cache file could not be decoded.
    #[error("Cache file {path} is corrupted: {reason}")]
    Corrupted {
        /// File that failed to decode.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Creates a write error.
    pub fn write(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Write {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a corrupted file error.
    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
