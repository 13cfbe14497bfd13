//! # kiln_core
//!
//! Build orchestration for Kiln.
//!
//! This crate provides:
//! - The `BuildOrchestrator`: staleness checks, build banners and atomic
//!   artifact publication around a compiler backend
//! - Configuration loading
//! - Source discovery
//! - The `Pipeline` that wires cache, image registry and backends together
//!
//! ## Example
//!
//! ```rust,ignore
//! use kiln_core::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::from_file(".kiln.json")?;
//! let pipeline = Pipeline::new(config)?;
//!
//! if let Some(css) = pipeline.ensure_built("assets/scss/app.scss".as_ref(), false)? {
//!     println!("{}", css.display());
//! }
//! ```

pub mod banner;
mod config;
mod error;
mod orchestrator;
mod pipeline;
mod source_finder;

pub use config::{
    CacheConfig, ImageConfig, Mode, PipelineConfig, ScriptConfig, StylesheetConfig,
    TranspilerConfig,
};
pub use error::BuildError;
pub use orchestrator::BuildOrchestrator;
pub use pipeline::{BuildReport, BuiltArtifact, Pipeline};
pub use source_finder::SourceFinder;
