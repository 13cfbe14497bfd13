//! # kiln_assets
//!
//! Image asset registry for Kiln.
//!
//! Maps logical image names (`logo.svg`, `icons/close.png`) to the files that
//! provide them, so stylesheets and scripts can refer to images independently
//! of the directory they live in.

mod error;
mod registry;
mod scanner;

pub use error::RegistryError;
pub use registry::{ImageAssetRegistry, REGISTRY_CACHE_KEY, RegistryOptions};
pub use scanner::{IMAGE_EXTENSIONS, ImageScanner, logical_name};
