//! Build error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while building assets.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Compiler backend error.
    #[error(transparent)]
    Compiler(#[from] kiln_compiler::CompilerError),

    /// Cache error.
    #[error("Cache error: {0}")]
    Cache(#[from] kiln_cache::CacheError),

    /// Image registry error.
    #[error("Image registry error: {0}")]
    Registry(#[from] kiln_assets::RegistryError),

    /// An artifact could not be written to the build directory.
    #[error("Failed to publish {}: {source}", .path.display())]
    Publish {
        /// Artifact or directory that could not be written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a publish error.
    pub fn publish(path: &Path, source: std::io::Error) -> Self {
        Self::Publish {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the compile error, if this is one.
    pub fn as_compile_error(&self) -> Option<&kiln_compiler::CompileError> {
        match self {
            Self::Compiler(kiln_compiler::CompilerError::Compile(err)) => Some(err),
            _ => None,
        }
    }
}
