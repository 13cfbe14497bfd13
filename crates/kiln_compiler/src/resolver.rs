use kiln_assets::{ImageAssetRegistry, RegistryError};

/// Resolves logical image names for `asset_path()` / `asset_url()`.
pub trait AssetResolver: Send + Sync {
    /// Returns the path registered for `name`.
    fn resolve(&self, name: &str) -> Result<String, RegistryError>;
}

impl AssetResolver for ImageAssetRegistry {
    fn resolve(&self, name: &str) -> Result<String, RegistryError> {
        ImageAssetRegistry::resolve(self, name)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;

    /// Fixed name → path table.
    pub struct StaticAssets(pub BTreeMap<String, String>);

    impl AssetResolver for StaticAssets {
        fn resolve(&self, name: &str) -> Result<String, RegistryError> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| RegistryError::not_found(name))
        }
    }

    pub fn assets(pairs: &[(&str, &str)]) -> Arc<dyn AssetResolver> {
        Arc::new(StaticAssets(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }
}
