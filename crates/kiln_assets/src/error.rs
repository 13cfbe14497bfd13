//! Registry error types.

use thiserror::Error;

/// Errors that can occur in the image registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No image is registered under the requested logical name.
    #[error("Asset not found: {name}")]
    NotFound {
        /// The requested logical name.
        name: String,
    },

    /// The image scanner could not be set up.
    #[error("Scanner error: {0}")]
    Scanner(String),

    /// Persisting the registry failed.
    #[error("Cache error: {0}")]
    Cache(#[from] kiln_cache::CacheError),
}

impl RegistryError {
    /// Creates a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}
