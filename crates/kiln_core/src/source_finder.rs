use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::info;
use walkdir::WalkDir;

use crate::BuildError;

/// Lists source files under the configured source directories.
pub struct SourceFinder {
    names: GlobSet,
    partials: GlobSet,
    excluded_dirs: Vec<PathBuf>,
}

impl SourceFinder {
    /// Creates a finder for files ending in any of `extensions` (`scss`, `js.php`).
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Result<Self, BuildError> {
        Ok(Self {
            names: glob_set("?*", extensions)?,
            partials: GlobSet::empty(),
            excluded_dirs: Vec::new(),
        })
    }

    /// Skips `_`-prefixed files with any of `extensions`.
    ///
    /// Sass partials are only compiled through the stylesheets importing them.
    pub fn skip_partials<S: AsRef<str>>(mut self, extensions: &[S]) -> Result<Self, BuildError> {
        self.partials = glob_set("_*", extensions)?;
        Ok(self)
    }

    /// Skips everything under `dirs`, typically the build directories.
    pub fn exclude(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.excluded_dirs.extend(dirs);
        self
    }

    /// Checks if a file name matches one of the extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|name| {
            let name = Path::new(name);
            self.names.is_match(name) && !self.partials.is_match(name)
        })
    }

    /// Walks `dirs` in order and returns every matching file.
    ///
    /// Missing directories are skipped. Files are sorted within each directory
    /// and a file reachable from two directories is listed once.
    pub fn find(&self, dirs: &[PathBuf]) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for dir in dirs {
            if !dir.is_dir() {
                continue;
            }

            let walker = WalkDir::new(dir)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !self.is_excluded(entry.path()));

            for entry in walker.filter_map(|e| e.ok()) {
                let path = entry.path();
                if entry.file_type().is_file() && self.matches(path) && seen.insert(path.to_path_buf())
                {
                    files.push(path.to_path_buf());
                }
            }
        }

        info!("Discovered {} source files", files.len());
        files
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded_dirs.iter().any(|dir| path.starts_with(dir))
    }
}

fn glob_set<S: AsRef<str>>(stem: &str, extensions: &[S]) -> Result<GlobSet, BuildError> {
    let mut builder = GlobSetBuilder::new();
    for extension in extensions {
        let pattern = format!("{}.{}", stem, extension.as_ref());
        let glob = Glob::new(&pattern)
            .map_err(|e| BuildError::config(format!("Invalid pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
    }

    builder
        .build()
        .map_err(|e| BuildError::config(format!("Failed to build globset: {}", e)))
}
