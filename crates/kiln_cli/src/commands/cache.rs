//! Cache command implementation

use std::sync::Arc;

use kiln_cache::{CacheOptions, CacheStore, MemoryCache};
use kiln_core::PipelineConfig;
use miette::{IntoDiagnostic, Result};

use super::load_config;
use crate::cli::Cli;

fn cache_options(config: &PipelineConfig) -> CacheOptions {
    CacheOptions::new(config.resolve_path(&config.cache.dir))
}

/// Replays the durable cache into a fresh in-memory cache and reports the count.
pub fn run_cache_preload(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let store = CacheStore::new(cache_options(&config).fast(true).preload(true))
        .with_fast_backend(Arc::new(MemoryCache::new()));

    let count = store.preload().into_diagnostic()?;
    println!("Preloaded {} cache entries", count);
    Ok(())
}

pub fn run_cache_clear(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let store = CacheStore::new(cache_options(&config));

    let removed = store.clear().into_diagnostic()?;
    println!("Removed {} cache entries", removed);
    Ok(())
}
