//! # kiln_cache
//!
//! Two-tier key/value cache for Kiln.
//!
//! Values live in a durable on-disk store (one JSON file per key) and can
//! optionally be mirrored into a fast in-memory backend that is preloaded once
//! per deployment.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kiln_cache::{CacheOptions, CacheStore, MemoryCache};
//!
//! let store = CacheStore::new(CacheOptions::new(".kiln-cache").fast(true))
//!     .with_fast_backend(Arc::new(MemoryCache::new()));
//!
//! store.save_encoded("images", &registry)?;
//! let registry: Registry = store.get("images", Registry::default());
//! ```

mod durable;
mod error;
mod fast;
pub mod fs;
mod store;

pub use durable::{DurableStore, StoredValue};
pub use error::CacheError;
pub use fast::{FastCache, MemoryCache};
pub use store::{CacheOptions, CacheStore, PRELOAD_SENTINEL_KEY};
