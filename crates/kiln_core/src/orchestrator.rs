//! Staleness checks and atomic publication around a compiler backend.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Instant, SystemTime};

use chrono::Local;
use kiln_cache::fs::atomic_write;
use kiln_compiler::CompilerBackend;
use tracing::{debug, error, info};

use crate::{BuildError, banner};

/// Builds artifacts for one compiler backend.
///
/// An artifact is rebuilt when it is missing, when it is not strictly newer
/// than its source, or when a rebuild is forced. Artifacts are written to a
/// temporary file next to their final path and renamed into place, so a
/// reader never sees a partial artifact.
pub struct BuildOrchestrator {
    backend: Arc<dyn CompilerBackend>,
    build_dir: PathBuf,
    source_dirs: Vec<PathBuf>,
    compile_count: AtomicUsize,
}

impl BuildOrchestrator {
    /// Creates an orchestrator writing into `build_dir`.
    pub fn new(backend: Arc<dyn CompilerBackend>, build_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            build_dir: build_dir.into(),
            source_dirs: Vec::new(),
            compile_count: AtomicUsize::new(0),
        }
    }

    /// Sets the source directories whose layout is mirrored under the build
    /// directory.
    pub fn with_source_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.source_dirs = dirs.into_iter().collect();
        self
    }

    /// Returns the wrapped backend.
    pub fn backend(&self) -> &Arc<dyn CompilerBackend> {
        &self.backend
    }

    /// Returns the build directory.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Returns how many times the backend has been invoked.
    pub fn compile_count(&self) -> usize {
        self.compile_count.load(Ordering::Relaxed)
    }

    /// Returns the artifact path for `source`, or `None` if it has no file name.
    ///
    /// A source inside one of the source directories keeps its relative
    /// directory (`admin/main.scss` becomes `<build_dir>/admin/main.css`), so
    /// equally named sources never share an artifact. The most specific
    /// source directory wins. Other sources land directly in the build
    /// directory.
    pub fn artifact_path(&self, source: &Path) -> Option<PathBuf> {
        let name = source.file_name()?.to_str()?;
        let artifact_name = self.backend.artifact_name(name);

        let subdir = self
            .relative_to_source_dir(source)
            .and_then(|relative| relative.parent().map(Path::to_path_buf))
            .unwrap_or_default();

        Some(self.build_dir.join(subdir).join(artifact_name))
    }

    fn relative_to_source_dir(&self, source: &Path) -> Option<PathBuf> {
        let absolute = std::path::absolute(source).ok();
        let candidates = [Some(source), absolute.as_deref()];

        self.source_dirs
            .iter()
            .filter_map(|dir| {
                candidates
                    .iter()
                    .flatten()
                    .find_map(|candidate| candidate.strip_prefix(dir).ok())
                    .map(|relative| (dir.components().count(), relative.to_path_buf()))
            })
            .max_by_key(|(depth, _)| *depth)
            .map(|(_, relative)| relative)
    }

    /// Makes sure the artifact for `source` is up to date.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(path))` with the artifact path when it is fresh or was rebuilt
    /// - `Ok(None)` when `source` is not a file, or the artifact could not be
    ///   written (the failure is logged)
    /// - `Err` when the backend fails
    pub fn ensure_built(&self, source: &Path, forced: bool) -> Result<Option<PathBuf>, BuildError> {
        if source.as_os_str().is_empty() || !source.is_file() {
            debug!("Not a source file: {}", source.display());
            return Ok(None);
        }

        let Some(artifact) = self.artifact_path(source) else {
            debug!("No artifact name for {}", source.display());
            return Ok(None);
        };

        if !forced && is_fresh(source, &artifact) {
            debug!("Up to date: {}", artifact.display());
            return Ok(Some(artifact));
        }

        let built_at = Local::now();
        let start = Instant::now();
        self.compile_count.fetch_add(1, Ordering::Relaxed);
        let output = self.backend.compile(source)?;
        let duration = start.elapsed();

        let mut contents = banner::render(self.backend.descriptor(), built_at, duration);
        contents.push_str(&output);

        match self.publish(&artifact, contents.as_bytes()) {
            Ok(()) => {
                info!(
                    "Built {} in {:.3}s",
                    artifact.display(),
                    duration.as_secs_f64()
                );
                Ok(Some(artifact))
            }
            Err(e) => {
                error!("{}", e);
                Ok(None)
            }
        }
    }

    fn publish(&self, artifact: &Path, contents: &[u8]) -> Result<(), BuildError> {
        let dir = artifact.parent().unwrap_or(self.build_dir.as_path());
        fs::create_dir_all(dir).map_err(|e| BuildError::publish(dir, e))?;
        atomic_write(artifact, contents).map_err(|e| BuildError::publish(artifact, e))
    }
}

/// The artifact is fresh when it exists and is strictly newer than the source.
fn is_fresh(source: &Path, artifact: &Path) -> bool {
    let Some(artifact_time) = modified(artifact) else {
        return false;
    };
    // Unreadable source timestamp means rebuild
    modified(source).is_some_and(|source_time| artifact_time > source_time)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
