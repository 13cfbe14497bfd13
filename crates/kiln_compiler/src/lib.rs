//! # kiln_compiler
//!
//! Compiler backends for Kiln.
//!
//! This crate provides:
//! - The `CompilerBackend` trait and its descriptor types
//! - `ScssBackend`: SCSS stylesheets compiled with grass
//! - `TranspilerBackend`: JavaScript run through an external transpiler
//! - `EmbeddedScriptBackend`: JavaScript templates with embedded host code
//!
//! Backends only produce output text. Staleness checks and publishing are the
//! job of the build orchestrator in `kiln_core`.

pub mod asset_functions;
mod backend;
pub mod embedded;
mod error;
mod resolver;
mod scss;
mod transpiler;

pub use backend::{AssetFamily, BackendKind, CompilerBackend, CompilerDescriptor, replace_extension};
pub use embedded::{EmbeddedOptions, EmbeddedScriptBackend};
pub use error::{CompileError, CompilerError};
pub use resolver::AssetResolver;
pub use scss::{ScssBackend, ScssOptions};
pub use transpiler::{TranspilerBackend, TranspilerOptions};
