//! Compiler error types.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A compile failure attributed to a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Source file that failed to compile.
    pub path: PathBuf,
    /// Description of the failure.
    pub message: String,
    /// 1-based line in the source file, when it could be determined.
    pub line: Option<usize>,
}

impl CompileError {
    /// Creates a compile error.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            line,
        }
    }

    /// Returns the source line, or `-1` when unknown.
    pub fn line_or_unknown(&self) -> i64 {
        self.line.map_or(-1, |line| line as i64)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.path.display(), line, self.message),
            None => write!(f, "{}: {}", self.path.display(), self.message),
        }
    }
}

impl std::error::Error for CompileError {}

/// Errors that can occur while running a compiler backend.
#[derive(Debug, Error)]
pub enum CompilerError {
    /// The source could not be compiled.
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// A required tool or configuration file is absent.
    #[error("Missing dependency: {what} ({})", .path.display())]
    MissingDependency {
        /// What is missing.
        what: String,
        /// Where it was expected.
        path: PathBuf,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompilerError {
    /// Creates a compile error.
    pub fn compile(path: &Path, message: impl Into<String>, line: Option<usize>) -> Self {
        Self::Compile(CompileError::new(path, message, line))
    }

    /// Creates a missing dependency error.
    pub fn missing(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingDependency {
            what: what.into(),
            path: path.into(),
        }
    }
}
