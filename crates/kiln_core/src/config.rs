//! Pipeline configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::BuildError;

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/config.json");
static CONFIG_SCHEMA: OnceLock<Validator> = OnceLock::new();

/// Deployment mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Rescan images on start-up and emit readable output.
    #[default]
    Development,
    /// Trust persisted registries and emit compressed output.
    Production,
}

/// Configuration for the build pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deployment mode.
    #[serde(default)]
    pub mode: Mode,

    /// Stylesheet sources.
    #[serde(default)]
    pub stylesheets: StylesheetConfig,

    /// Script sources.
    #[serde(default)]
    pub scripts: ScriptConfig,

    /// Image directories.
    #[serde(default)]
    pub images: ImageConfig,

    /// Cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Values exposed to embedded scripts through `config(key)`.
    #[serde(default)]
    pub variables: Map<String, Value>,

    /// Base directory for resolving relative paths.
    /// This is usually the directory containing the configuration file.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// Stylesheet settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StylesheetConfig {
    /// Source and import directories, in priority order.
    #[serde(default)]
    pub source_dirs: Vec<String>,

    /// Output directory for compiled CSS.
    #[serde(default = "default_stylesheet_build_dir")]
    pub build_dir: String,
}

impl Default for StylesheetConfig {
    fn default() -> Self {
        Self {
            source_dirs: Vec::new(),
            build_dir: default_stylesheet_build_dir(),
        }
    }
}

/// Script settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptConfig {
    /// Source directories, in priority order.
    #[serde(default)]
    pub source_dirs: Vec<String>,

    /// Output directory for compiled JavaScript.
    #[serde(default = "default_script_build_dir")]
    pub build_dir: String,

    /// External transpiler for `.js` sources. Without one, plain `.js` files are not built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transpiler: Option<TranspilerConfig>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            source_dirs: Vec::new(),
            build_dir: default_script_build_dir(),
            transpiler: None,
        }
    }
}

/// External transpiler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranspilerConfig {
    /// Executable name or path.
    pub binary: String,

    /// Transpiler configuration file.
    #[serde(default = "default_transpiler_config_file")]
    pub config_file: String,

    /// Kill the transpiler after this many milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Version shown in build banners.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl TranspilerConfig {
    /// Returns the timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Image registry settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageConfig {
    /// Directories scanned for images, in priority order.
    #[serde(default)]
    pub dirs: Vec<String>,

    /// Stored paths are made relative to this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_root: Option<String>,

    /// Scan image directories even in production.
    #[serde(default)]
    pub force_rebuild: bool,
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Directory for durable cache files.
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    /// Use the in-memory cache. `None` means "in production only".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast: Option<bool>,

    /// Replay the durable cache into the in-memory cache on start-up.
    #[serde(default)]
    pub preload: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            fast: None,
            preload: false,
        }
    }
}

fn default_stylesheet_build_dir() -> String {
    "build/css".to_string()
}

fn default_script_build_dir() -> String {
    "build/js".to_string()
}

fn default_transpiler_config_file() -> String {
    "babel.config.json".to_string()
}

fn default_cache_dir() -> String {
    ".kiln-cache".to_string()
}

impl PipelineConfig {
    /// Configuration file names searched for, in order.
    pub const CONFIG_FILES: &'static [&'static str] = &[".kiln.json"];

    /// Creates a configuration with every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| BuildError::config(format!("Failed to read config: {}", e)))?;

        let mut config = Self::from_json(&content)?;

        if let Some(parent) = path.parent() {
            config.base_dir = Some(parent.to_path_buf());
        }

        Ok(config)
    }

    /// Looks for a configuration file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        Self::CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Parses configuration from a JSON string with schema validation.
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| BuildError::config(format!("Invalid JSON: {}", e)))?;

        let schema = CONFIG_SCHEMA.get_or_init(|| {
            let schema_json: Value =
                serde_json::from_str(SCHEMA_JSON).expect("Invalid embedded config schema");
            Validator::new(&schema_json).expect("Invalid config schema compilation")
        });

        if let Err(e) = schema.validate(&value) {
            let error_msg = format!("{} at {}", e, e.instance_path());
            return Err(BuildError::config(format!(
                "Config validation failed: {}",
                error_msg
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| BuildError::config(format!("Invalid config: {}", e)))
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, BuildError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BuildError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Returns true in production mode.
    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }

    /// Returns whether the in-memory cache is used.
    pub fn fast_cache_enabled(&self) -> bool {
        self.cache.fast.unwrap_or_else(|| self.is_production())
    }

    /// Resolves a configured path against the base directory.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Resolved stylesheet source directories.
    pub fn stylesheet_source_dirs(&self) -> Vec<PathBuf> {
        self.resolve_all(&self.stylesheets.source_dirs)
    }

    /// Resolved script source directories.
    pub fn script_source_dirs(&self) -> Vec<PathBuf> {
        self.resolve_all(&self.scripts.source_dirs)
    }

    /// Resolved image directories.
    pub fn image_dirs(&self) -> Vec<PathBuf> {
        self.resolve_all(&self.images.dirs)
    }

    fn resolve_all(&self, paths: &[String]) -> Vec<PathBuf> {
        paths.iter().map(|p| self.resolve_path(p)).collect()
    }
}
