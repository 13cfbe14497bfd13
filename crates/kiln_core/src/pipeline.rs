//! Composition root: cache, image registry and one orchestrator per backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_assets::{ImageAssetRegistry, RegistryOptions};
use kiln_cache::{CacheOptions, CacheStore, MemoryCache};
use kiln_compiler::{
    AssetFamily, AssetResolver, EmbeddedOptions, EmbeddedScriptBackend, ScssBackend, ScssOptions,
    TranspilerBackend, TranspilerOptions,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{BuildError, BuildOrchestrator, PipelineConfig, SourceFinder};

/// A source whose artifact is up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArtifact {
    /// Source file.
    pub source: PathBuf,
    /// Published artifact.
    pub artifact: PathBuf,
}

/// Outcome of building several sources.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Sources with an up-to-date artifact.
    pub built: Vec<BuiltArtifact>,
    /// Sources no backend handles, or whose artifact could not be published.
    pub skipped: Vec<PathBuf>,
    /// Sources whose backend failed.
    pub failures: Vec<(PathBuf, BuildError)>,
    /// Backend invocations made while building.
    pub compiled: usize,
}

impl BuildReport {
    /// Returns true if any source failed to build.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// The asset build pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    cache: Arc<CacheStore>,
    images: Arc<ImageAssetRegistry>,
    orchestrators: Vec<BuildOrchestrator>,
}

impl Pipeline {
    /// Builds the pipeline described by `config`.
    ///
    /// Preloads the fast cache when configured, sets up the image registry
    /// (from its persisted copy in production) and registers every configured
    /// image directory.
    pub fn new(config: PipelineConfig) -> Result<Self, BuildError> {
        let production = config.is_production();

        let cache_options = CacheOptions::new(config.resolve_path(&config.cache.dir))
            .fast(config.fast_cache_enabled())
            .preload(config.cache.preload);
        let cache = Arc::new(
            CacheStore::new(cache_options).with_fast_backend(Arc::new(MemoryCache::new())),
        );
        cache.preload()?;

        let registry_options = RegistryOptions {
            production,
            force_rebuild: config.images.force_rebuild,
            public_root: config
                .images
                .public_root
                .as_ref()
                .map(|root| config.resolve_path(root)),
        };
        // Only a registry that will not be rescanned starts from the persisted copy
        let images = if production && !config.images.force_rebuild {
            ImageAssetRegistry::load(cache.clone(), registry_options)?
        } else {
            ImageAssetRegistry::new(cache.clone(), registry_options)?
        };
        let images = Arc::new(images);
        for dir in config.image_dirs() {
            if !images.register_directory(&dir)? {
                debug!("Image directory not registered: {}", dir.display());
            }
        }

        let assets: Arc<dyn AssetResolver> = images.clone();
        let stylesheet_build_dir = config.resolve_path(&config.stylesheets.build_dir);
        let script_build_dir = config.resolve_path(&config.scripts.build_dir);

        let mut orchestrators = vec![
            BuildOrchestrator::new(
                Arc::new(ScssBackend::new(
                    ScssOptions {
                        import_paths: config.stylesheet_source_dirs(),
                        compressed: production,
                    },
                    assets.clone(),
                )),
                &stylesheet_build_dir,
            )
            .with_source_dirs(config.stylesheet_source_dirs()),
            BuildOrchestrator::new(
                Arc::new(EmbeddedScriptBackend::new(
                    EmbeddedOptions {
                        production,
                        variables: config.variables.clone(),
                    },
                    assets,
                )),
                &script_build_dir,
            )
            .with_source_dirs(config.script_source_dirs()),
        ];

        if let Some(transpiler) = &config.scripts.transpiler {
            let mut options = TranspilerOptions::new(
                &transpiler.binary,
                config.resolve_path(&transpiler.config_file),
            );
            options.timeout = transpiler.timeout();
            options.version = transpiler.version.clone();
            orchestrators.push(
                BuildOrchestrator::new(
                    Arc::new(TranspilerBackend::new(options)),
                    &script_build_dir,
                )
                .with_source_dirs(config.script_source_dirs()),
            );
        }

        info!(
            "Pipeline ready ({:?} mode, {} images, {} backends)",
            config.mode,
            images.len(),
            orchestrators.len()
        );

        Ok(Self {
            config,
            cache,
            images,
            orchestrators,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the cache store.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Returns the image registry.
    pub fn images(&self) -> &Arc<ImageAssetRegistry> {
        &self.images
    }

    /// Returns the orchestrators, one per backend.
    pub fn orchestrators(&self) -> &[BuildOrchestrator] {
        &self.orchestrators
    }

    /// Returns the orchestrator whose backend handles `source`.
    ///
    /// The longest matching extension wins, so `app.js.php` goes to the
    /// embedded script backend even when a `.js` transpiler is configured.
    pub fn orchestrator_for(&self, source: &Path) -> Option<&BuildOrchestrator> {
        self.orchestrators
            .iter()
            .filter(|o| o.backend().handles(source))
            .max_by_key(|o| o.backend().descriptor().extension.len())
    }

    /// Makes sure the artifact for `source` is up to date.
    ///
    /// Returns `Ok(None)` for sources no backend handles.
    pub fn ensure_built(&self, source: &Path, forced: bool) -> Result<Option<PathBuf>, BuildError> {
        match self.orchestrator_for(source) {
            Some(orchestrator) => orchestrator.ensure_built(source, forced),
            None => {
                debug!("No backend for {}", source.display());
                Ok(None)
            }
        }
    }

    /// Lists every source under the configured source directories.
    ///
    /// Stylesheet partials (`_colors.scss`) are left out.
    pub fn sources(&self) -> Result<Vec<PathBuf>, BuildError> {
        let extensions: Vec<String> = self
            .orchestrators
            .iter()
            .map(|o| o.backend().descriptor().extension.clone())
            .collect();

        let stylesheet_extensions: Vec<String> = self
            .orchestrators
            .iter()
            .map(|o| o.backend().descriptor())
            .filter(|d| d.family == AssetFamily::Stylesheet)
            .map(|d| d.extension.clone())
            .collect();

        let finder = SourceFinder::new(&extensions)?
            .skip_partials(&stylesheet_extensions)?
            .exclude(self.orchestrators.iter().map(|o| o.build_dir().to_path_buf()));

        let mut dirs = self.config.stylesheet_source_dirs();
        dirs.extend(self.config.script_source_dirs());
        Ok(finder.find(&dirs))
    }

    /// Builds every source under the configured source directories.
    pub fn build_all(&self, forced: bool) -> Result<BuildReport, BuildError> {
        let sources = self.sources()?;
        Ok(self.build_paths(&sources, forced))
    }

    /// Builds `sources` in parallel.
    pub fn build_paths(&self, sources: &[PathBuf], forced: bool) -> BuildReport {
        let compiled_before = self.compile_count();

        let results: Vec<(PathBuf, Result<Option<PathBuf>, BuildError>)> = sources
            .par_iter()
            .map(|source| (source.clone(), self.ensure_built(source, forced)))
            .collect();

        let mut report = BuildReport::default();
        for (source, result) in results {
            match result {
                Ok(Some(artifact)) => report.built.push(BuiltArtifact { source, artifact }),
                Ok(None) => report.skipped.push(source),
                Err(e) => {
                    warn!("Failed to build {}: {}", source.display(), e);
                    report.failures.push((source, e));
                }
            }
        }

        report.compiled = self.compile_count().saturating_sub(compiled_before);
        report
    }

    /// Total backend invocations across all orchestrators.
    pub fn compile_count(&self) -> usize {
        self.orchestrators.iter().map(|o| o.compile_count()).sum()
    }
}
