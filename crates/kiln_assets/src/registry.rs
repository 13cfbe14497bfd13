//! Logical image name registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_cache::CacheStore;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::RegistryError;
use crate::scanner::{ImageScanner, logical_name};

/// Cache key under which the registry is persisted.
pub const REGISTRY_CACHE_KEY: &str = "kiln.assets.images";

/// Options controlling when the registry scans the filesystem.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Production-like deployment: trust the persisted registry.
    pub production: bool,
    /// Scan even in production.
    pub force_rebuild: bool,
    /// Stored paths are made relative to this directory when possible.
    pub public_root: Option<PathBuf>,
}

impl RegistryOptions {
    fn scans(&self) -> bool {
        !self.production || self.force_rebuild
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    directories: Vec<PathBuf>,
    images: BTreeMap<String, String>,
}

/// Maps logical image names to image paths.
///
/// Populated at start-up (from the cache, then by registering directories)
/// and read-only while requests are served.
pub struct ImageAssetRegistry {
    cache: Arc<CacheStore>,
    options: RegistryOptions,
    scanner: ImageScanner,
    state: RwLock<RegistryState>,
}

impl ImageAssetRegistry {
    /// Creates an empty registry.
    pub fn new(cache: Arc<CacheStore>, options: RegistryOptions) -> Result<Self, RegistryError> {
        Ok(Self {
            cache,
            options,
            scanner: ImageScanner::new()?,
            state: RwLock::new(RegistryState::default()),
        })
    }

    /// Creates a registry seeded from the persisted copy.
    ///
    /// The fast cache is consulted first, then the durable store. A persisted
    /// copy that cannot be read is ignored.
    pub fn load(cache: Arc<CacheStore>, options: RegistryOptions) -> Result<Self, RegistryError> {
        let images = match cache.get::<Option<BTreeMap<String, String>>>(REGISTRY_CACHE_KEY, None)
        {
            Some(images) => images,
            None => match cache.load_encoded::<BTreeMap<String, String>>(REGISTRY_CACHE_KEY) {
                Ok(images) => images.unwrap_or_default(),
                Err(e) => {
                    warn!("Ignoring persisted image registry: {}", e);
                    BTreeMap::new()
                }
            },
        };

        debug!("Loaded {} image entries from cache", images.len());
        let registry = Self::new(cache, options)?;
        registry.state.write().images = images;
        Ok(registry)
    }

    /// Registers an image directory.
    ///
    /// Non-existent paths and directories registered before are ignored. In
    /// production without a forced rebuild the directory is only recorded;
    /// otherwise it is scanned and the registry persisted. Names already
    /// present keep their earlier mapping.
    ///
    /// Returns `true` if the directory was newly registered.
    pub fn register_directory(&self, dir: impl AsRef<Path>) -> Result<bool, RegistryError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            debug!("Ignoring missing image directory {}", dir.display());
            return Ok(false);
        }

        {
            let mut state = self.state.write();
            if state.directories.iter().any(|known| known == dir) {
                return Ok(false);
            }
            state.directories.push(dir.to_path_buf());
        }

        if !self.options.scans() {
            debug!("Production mode, not scanning {}", dir.display());
            return Ok(true);
        }

        let added = self.scan_into_state(dir);
        info!("Registered {} images from {}", added, dir.display());
        self.persist()?;

        Ok(true)
    }

    /// Rescans every registered directory from scratch and persists the result.
    pub fn rebuild(&self) -> Result<usize, RegistryError> {
        let directories = {
            let mut state = self.state.write();
            state.images.clear();
            state.directories.clone()
        };

        for dir in &directories {
            self.scan_into_state(dir);
        }
        self.persist()?;

        let count = self.len();
        info!("Rebuilt image registry with {} entries", count);
        Ok(count)
    }

    /// Resolves a logical image name.
    pub fn resolve(&self, name: &str) -> Result<String, RegistryError> {
        self.state
            .read()
            .images
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(name))
    }

    /// Returns a snapshot of all entries, ordered by logical name.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.state.read().images.clone()
    }

    /// Returns the registered directories in registration order.
    pub fn directories(&self) -> Vec<PathBuf> {
        self.state.read().directories.clone()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.state.read().images.len()
    }

    /// Returns true if the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.state.read().images.is_empty()
    }

    fn scan_into_state(&self, dir: &Path) -> usize {
        let files = self.scanner.scan(dir);
        let mut state = self.state.write();
        let mut added = 0;

        for file in files {
            let Some(name) = logical_name(&file) else {
                continue;
            };
            if state.images.contains_key(&name) {
                debug!("Image '{}' already registered, skipping {}", name, file.display());
                continue;
            }
            state.images.insert(name, self.stored_path(&file));
            added += 1;
        }

        added
    }

    fn stored_path(&self, file: &Path) -> String {
        let path = self
            .options
            .public_root
            .as_deref()
            .and_then(|root| file.strip_prefix(root).ok())
            .unwrap_or(file);

        path.to_string_lossy().replace('\\', "/")
    }

    fn persist(&self) -> Result<(), RegistryError> {
        let images = self.entries();
        self.cache.save_encoded(REGISTRY_CACHE_KEY, &images)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_cache::{CacheOptions, MemoryCache};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn write_image(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn cache_in(dir: &TempDir) -> Arc<CacheStore> {
        Arc::new(CacheStore::new(CacheOptions::new(dir.path().join("cache"))))
    }

    #[test]
    fn test_first_registered_directory_wins() {
        let tmp = tempdir().unwrap();
        let dir_a = tmp.path().join("a");
        let dir_b = tmp.path().join("b");
        let logo_a = write_image(&dir_a, "logo.svg", "a");
        write_image(&dir_b, "logo.svg", "b");
        write_image(&dir_b, "icons/close.png", "b");

        let registry = ImageAssetRegistry::new(cache_in(&tmp), RegistryOptions::default()).unwrap();
        assert!(registry.register_directory(&dir_a).unwrap());
        assert!(registry.register_directory(&dir_b).unwrap());

        assert_eq!(
            registry.resolve("logo.svg").unwrap(),
            logo_a.to_string_lossy().to_string()
        );
        assert!(registry.resolve("close.png").is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_is_idempotent_and_ignores_missing() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("img");
        write_image(&dir, "a.png", "a");

        let registry = ImageAssetRegistry::new(cache_in(&tmp), RegistryOptions::default()).unwrap();
        assert!(registry.register_directory(&dir).unwrap());
        assert!(!registry.register_directory(&dir).unwrap());
        assert!(!registry.register_directory(tmp.path().join("missing")).unwrap());

        assert_eq!(registry.directories(), vec![dir]);
    }

    #[test]
    fn test_resolve_missing_name() {
        let tmp = tempdir().unwrap();
        let registry = ImageAssetRegistry::new(cache_in(&tmp), RegistryOptions::default()).unwrap();

        let err = registry.resolve("nope.svg").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { ref name } if name == "nope.svg"));
        assert!(err.to_string().contains("nope.svg"));
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("img");
        write_image(&dir, "Logo.svg", "a");

        let registry = ImageAssetRegistry::new(cache_in(&tmp), RegistryOptions::default()).unwrap();
        registry.register_directory(&dir).unwrap();

        assert!(registry.resolve("Logo.svg").is_ok());
        assert!(registry.resolve("logo.svg").is_err());
    }

    #[test]
    fn test_public_root_relative_paths() {
        let tmp = tempdir().unwrap();
        let public = tmp.path().join("public");
        let images = public.join("images");
        write_image(&images, "icons/close.png", "x");

        let options = RegistryOptions {
            public_root: Some(public.clone()),
            ..RegistryOptions::default()
        };
        let registry = ImageAssetRegistry::new(cache_in(&tmp), options).unwrap();
        registry.register_directory(&images).unwrap();

        assert_eq!(
            registry.resolve("icons/close.png").unwrap(),
            "images/icons/close.png"
        );
    }

    #[test]
    fn test_production_skips_scan_and_uses_persisted_registry() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("img");
        write_image(&dir, "logo.svg", "a");
        let cache = cache_in(&tmp);

        {
            let dev = ImageAssetRegistry::new(cache.clone(), RegistryOptions::default()).unwrap();
            dev.register_directory(&dir).unwrap();
        }

        // Added after the registry was persisted: production must not see it
        write_image(&dir, "late.png", "b");

        let options = RegistryOptions {
            production: true,
            ..RegistryOptions::default()
        };
        let prod = ImageAssetRegistry::load(cache, options).unwrap();
        assert!(prod.register_directory(&dir).unwrap());

        assert!(prod.resolve("logo.svg").is_ok());
        assert!(prod.resolve("late.png").is_err());
        assert_eq!(prod.directories(), vec![dir]);
    }

    #[test]
    fn test_forced_rebuild_scans_in_production() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("img");
        write_image(&dir, "logo.svg", "a");

        let options = RegistryOptions {
            production: true,
            force_rebuild: true,
            ..RegistryOptions::default()
        };
        let registry = ImageAssetRegistry::new(cache_in(&tmp), options).unwrap();
        registry.register_directory(&dir).unwrap();

        assert!(registry.resolve("logo.svg").is_ok());
    }

    #[test]
    fn test_load_prefers_fast_cache() {
        let tmp = tempdir().unwrap();
        let memory = Arc::new(MemoryCache::new());
        let cache = Arc::new(
            CacheStore::new(CacheOptions::new(tmp.path().join("cache")).fast(true))
                .with_fast_backend(memory),
        );
        let fast_copy: BTreeMap<String, String> =
            [("fast.svg".to_string(), "x/fast.svg".to_string())].into_iter().collect();
        cache.set(REGISTRY_CACHE_KEY, &fast_copy).unwrap();

        let registry = ImageAssetRegistry::load(cache, RegistryOptions::default()).unwrap();

        assert_eq!(registry.entries(), fast_copy);
    }

    #[test]
    fn test_rebuild_picks_up_new_files() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("img");
        write_image(&dir, "a.svg", "a");

        let registry = ImageAssetRegistry::new(cache_in(&tmp), RegistryOptions::default()).unwrap();
        registry.register_directory(&dir).unwrap();
        fs::remove_file(dir.join("a.svg")).unwrap();
        write_image(&dir, "b.svg", "b");

        assert_eq!(registry.rebuild().unwrap(), 1);
        assert!(registry.resolve("a.svg").is_err());
        assert!(registry.resolve("b.svg").is_ok());
    }
}
