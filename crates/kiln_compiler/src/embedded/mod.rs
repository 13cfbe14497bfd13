//! JavaScript templates with embedded host code (`*.js.php`).
//!
//! Text outside `<?php ... ?>` / `<?= ... ?>` blocks is copied as is. Each
//! block runs through a small evaluator that understands a PHP-compatible
//! subset: `echo`, variables, string and arithmetic operators, arrays and a
//! fixed set of functions. Whatever a block echoes replaces the block.

mod interpreter;
mod lexer;
mod parser;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    AssetFamily, AssetResolver, BackendKind, CompilerBackend, CompilerDescriptor, CompilerError,
};
use interpreter::{Capabilities, Interpreter};
use lexer::Lexer;
use parser::Parser;

const OPEN_MARKER: &str = "<?php";
const OPEN_ECHO_MARKER: &str = "<?=";
const CLOSE_MARKER: &str = "?>";

/// An evaluation failure inside one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EvalError {
    pub message: String,
    /// 1-based line within the block.
    pub line: usize,
}

impl EvalError {
    pub(crate) fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Options for the embedded script backend.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedOptions {
    /// Value of `is_production()`.
    pub production: bool,
    /// Read-only values exposed through `config(key)`.
    pub variables: Map<String, Value>,
}

/// Expands host-code blocks in `*.js.php` files.
pub struct EmbeddedScriptBackend {
    descriptor: CompilerDescriptor,
    options: EmbeddedOptions,
    assets: Arc<dyn AssetResolver>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    Inside,
}

impl EmbeddedScriptBackend {
    /// Creates a new embedded script backend.
    pub fn new(options: EmbeddedOptions, assets: Arc<dyn AssetResolver>) -> Self {
        Self {
            descriptor: CompilerDescriptor {
                kind: BackendKind::EmbeddedScript,
                name: "kiln-embedded".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
                extension: "js.php".to_string(),
                family: AssetFamily::Script,
            },
            options,
            assets,
        }
    }

    /// Expands a template given as text. `path` is used in error messages.
    pub fn compile_str(&self, source: &str, path: &Path) -> Result<String, CompilerError> {
        let mut interpreter = Interpreter::new(Capabilities {
            assets: &self.assets,
            variables: &self.options.variables,
            production: self.options.production,
        });

        let mut output = String::with_capacity(source.len());
        let mut state = State::Outside;
        let mut buffer: Vec<&str> = Vec::new();
        let mut echo_block = false;
        let mut line_no = 0;

        for raw_line in source.split_inclusive('\n') {
            line_no += 1;
            let (mut rest, terminator) = match raw_line.strip_suffix('\n') {
                Some(text) => (text, "\n"),
                None => (raw_line, ""),
            };

            loop {
                match state {
                    State::Outside => match find_open_marker(rest) {
                        Some((pos, marker)) => {
                            output.push_str(&rest[..pos]);
                            rest = &rest[pos + marker.len()..];
                            echo_block = marker == OPEN_ECHO_MARKER;
                            buffer.clear();
                            state = State::Inside;
                        }
                        None => {
                            output.push_str(rest);
                            output.push_str(terminator);
                            break;
                        }
                    },
                    State::Inside => match rest.find(CLOSE_MARKER) {
                        Some(pos) => {
                            buffer.push(&rest[..pos]);
                            let echoed =
                                self.evaluate(&mut interpreter, &buffer, echo_block, line_no, path)?;
                            output.push_str(&echoed);
                            rest = &rest[pos + CLOSE_MARKER.len()..];
                            state = State::Outside;
                            if rest.is_empty() {
                                output.push_str(terminator);
                                break;
                            }
                        }
                        None => {
                            buffer.push(rest);
                            break;
                        }
                    },
                }
            }
        }

        // A block left open at the end of the file runs to the end of the file
        if state == State::Inside {
            let echoed = self.evaluate(&mut interpreter, &buffer, echo_block, line_no, path)?;
            output.push_str(&echoed);
        }

        Ok(output)
    }

    fn evaluate(
        &self,
        interpreter: &mut Interpreter<'_>,
        buffer: &[&str],
        echo_block: bool,
        current_line: usize,
        path: &Path,
    ) -> Result<String, CompilerError> {
        let mut code = buffer.join("\n");
        if echo_block {
            code.insert_str(0, "echo ");
        }

        let result = Lexer::new(&code)
            .tokenize()
            .and_then(|tokens| Parser::new(tokens).parse())
            .and_then(|statements| interpreter.run(&statements));

        result.map_err(|e| {
            let line = physical_line(current_line, buffer.len(), e.line);
            debug!(
                "Block ending on line {} of {} failed: {}",
                current_line,
                path.display(),
                e.message
            );
            CompilerError::compile(path, e.message, Some(line))
        })
    }
}

/// Maps a 1-based line inside a block back to the file.
///
/// `current_line` is the line the block ended on and `buffered_lines` the
/// number of lines the block spans.
fn physical_line(current_line: usize, buffered_lines: usize, error_line: usize) -> usize {
    current_line.saturating_sub(buffered_lines.saturating_sub(error_line))
}

/// Finds the earliest open marker in `text`. A bare `<?` is not a marker.
fn find_open_marker(text: &str) -> Option<(usize, &'static str)> {
    [OPEN_MARKER, OPEN_ECHO_MARKER]
        .into_iter()
        .filter_map(|marker| text.find(marker).map(|pos| (pos, marker)))
        .min_by_key(|(pos, _)| *pos)
}

impl CompilerBackend for EmbeddedScriptBackend {
    fn descriptor(&self) -> &CompilerDescriptor {
        &self.descriptor
    }

    fn compile(&self, source: &Path) -> Result<String, CompilerError> {
        let text = fs::read_to_string(source)?;
        self.compile_str(&text, source)
    }

    fn artifact_name(&self, source_name: &str) -> String {
        source_name
            .strip_suffix(".php")
            .unwrap_or(source_name)
            .to_string()
    }
}
