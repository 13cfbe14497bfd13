//! SCSS backend.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::{Captures, Regex};
use tracing::debug;

use crate::asset_functions::{self, AssetFunctionError};
use crate::{
    AssetFamily, AssetResolver, BackendKind, CompilerBackend, CompilerDescriptor, CompilerError,
    replace_extension,
};

static LINE_PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
static UNNAMED_INPUT: OnceLock<Regex> = OnceLock::new();

fn line_patterns() -> &'static (Regex, Regex) {
    LINE_PATTERNS.get_or_init(|| {
        (
            Regex::new(r"line:\s*(\d+)").expect("Invalid line pattern"),
            Regex::new(r"(?m)^\s*\S+\s+(\d+):\d+\s+root stylesheet")
                .expect("Invalid location pattern"),
        )
    })
}

/// Name grass gives to input passed as a string, where it names a location.
fn unnamed_input() -> &'static Regex {
    UNNAMED_INPUT.get_or_init(|| {
        Regex::new(r"(^|\s)stdin(\s+(?:\d+:\d+|on line))").expect("Invalid input name pattern")
    })
}

/// Options for the SCSS backend.
#[derive(Debug, Clone, Default)]
pub struct ScssOptions {
    /// Directories searched by `@use` / `@import`, in priority order.
    pub import_paths: Vec<PathBuf>,
    /// Emit compressed CSS.
    pub compressed: bool,
}

/// Compiles SCSS with grass.
///
/// Stylesheets may call `asset_path(name)` and `asset_url(name)` to refer to
/// registered images.
pub struct ScssBackend {
    descriptor: CompilerDescriptor,
    options: ScssOptions,
    assets: Arc<dyn AssetResolver>,
}

impl ScssBackend {
    /// Creates a new SCSS backend.
    pub fn new(options: ScssOptions, assets: Arc<dyn AssetResolver>) -> Self {
        Self {
            descriptor: CompilerDescriptor {
                kind: BackendKind::Scss,
                name: "grass".to_string(),
                version: None,
                extension: "scss".to_string(),
                family: AssetFamily::Stylesheet,
            },
            options,
            assets,
        }
    }

    /// Compiles SCSS source text. `path` is used for imports and error messages.
    pub fn compile_str(&self, source: &str, path: &Path) -> Result<String, CompilerError> {
        let expanded = asset_functions::expand(source, self.assets.as_ref())
            .map_err(|e| CompilerError::compile(path, e.message, Some(e.line)))?;

        let style = if self.options.compressed {
            grass::OutputStyle::Compressed
        } else {
            grass::OutputStyle::Expanded
        };

        let imports = ExpandingFs::new(self.assets.as_ref());
        let mut grass_options = grass::Options::default()
            .style(style)
            .quiet(true)
            .fs(&imports);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            grass_options = grass_options.load_path(dir);
        }
        for dir in &self.options.import_paths {
            grass_options = grass_options.load_path(dir);
        }

        debug!("Compiling {} with grass", path.display());
        let result = grass::from_string(expanded, &grass_options);

        result.map_err(|e| {
            // An asset call in an imported file failed
            if let Some((import, failure)) = imports.take_failure() {
                return CompilerError::compile(&import, failure.message, Some(failure.line));
            }

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            let (message, line) = map_error(&e.to_string(), &file_name);
            CompilerError::compile(path, message, line)
        })
    }
}

/// Filesystem for grass that expands asset calls in every imported stylesheet.
struct ExpandingFs<'a> {
    assets: &'a dyn AssetResolver,
    failure: RefCell<Option<(PathBuf, AssetFunctionError)>>,
}

impl<'a> ExpandingFs<'a> {
    fn new(assets: &'a dyn AssetResolver) -> Self {
        Self {
            assets,
            failure: RefCell::new(None),
        }
    }

    fn take_failure(&self) -> Option<(PathBuf, AssetFunctionError)> {
        self.failure.borrow_mut().take()
    }
}

impl fmt::Debug for ExpandingFs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpandingFs")
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

impl grass::Fs for ExpandingFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let bytes = fs::read(path)?;
        if path.extension().is_none_or(|ext| ext != "scss") {
            return Ok(bytes);
        }

        let text = String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        match asset_functions::expand(&text, self.assets) {
            Ok(expanded) => Ok(expanded.into_bytes()),
            Err(failure) => {
                let err = io::Error::other(failure.message.clone());
                self.failure
                    .borrow_mut()
                    .get_or_insert_with(|| (path.to_path_buf(), failure));
                Err(err)
            }
        }
    }
}

impl CompilerBackend for ScssBackend {
    fn descriptor(&self) -> &CompilerDescriptor {
        &self.descriptor
    }

    fn compile(&self, source: &Path) -> Result<String, CompilerError> {
        let text = fs::read_to_string(source)?;
        self.compile_str(&text, source)
    }

    fn artifact_name(&self, source_name: &str) -> String {
        replace_extension(source_name, "css")
    }
}

/// Rewrites the unnamed-input placeholder and extracts the line number.
pub(crate) fn map_error(message: &str, file_name: &str) -> (String, Option<usize>) {
    let message = unnamed_input()
        .replace_all(message, |caps: &Captures| {
            format!("{}{}{}", &caps[1], file_name, &caps[2])
        })
        .into_owned();
    let (line_label, location) = line_patterns();

    let line = line_label
        .captures(&message)
        .or_else(|| location.captures(&message))
        .and_then(|caps| caps[1].parse().ok());

    (message, line)
}
