use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use crate::RegistryError;

/// File extensions recognised as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["svg", "png", "jpg", "jpeg", "gif", "ico"];

/// Directory component that roots logical image names.
const IMAGES_COMPONENT: &str = "images";

/// Finds image files below a directory.
pub struct ImageScanner {
    globs: GlobSet,
}

impl ImageScanner {
    pub fn new() -> Result<Self, RegistryError> {
        let pattern = format!("**/*.{{{}}}", IMAGE_EXTENSIONS.join(","));
        let glob = GlobBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| RegistryError::Scanner(format!("Invalid glob pattern: {}", e)))?;

        let mut builder = GlobSetBuilder::new();
        builder.add(glob);
        let globs = builder
            .build()
            .map_err(|e| RegistryError::Scanner(format!("Failed to build globset: {}", e)))?;

        Ok(Self { globs })
    }

    /// Checks if a path names an image file.
    pub fn is_image(&self, path: &Path) -> bool {
        self.globs.is_match(path)
    }

    /// Recursively lists image files below `dir`, sorted by path.
    pub fn scan(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_image(e.path()))
            .map(|e| e.into_path())
            .collect();
        files.sort();

        debug!("Found {} images in {}", files.len(), dir.display());
        files
    }
}

/// Derives the logical name of an image.
///
/// The name is the part of the path after the first `images` directory, or the
/// bare file name when the path has no such directory. Separators are always
/// `/`.
pub fn logical_name(path: &Path) -> Option<String> {
    let components: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    if let Some(pos) = components.iter().position(|c| *c == IMAGES_COMPONENT)
        && pos + 1 < components.len()
    {
        return Some(components[pos + 1..].join("/"));
    }

    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    #[rstest]
    #[case("/srv/app/images/logo.svg", "logo.svg")]
    #[case("/srv/app/images/icons/close.png", "icons/close.png")]
    #[case("/srv/images/app/images/logo.svg", "app/images/logo.svg")]
    #[case("/srv/app/assets/photo.JPG", "photo.JPG")]
    #[case("relative/images/a.gif", "a.gif")]
    fn test_logical_name(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(logical_name(Path::new(path)).as_deref(), Some(expected));
    }

    #[rstest]
    #[case("logo.svg", true)]
    #[case("photo.jpeg", true)]
    #[case("PHOTO.PNG", true)]
    #[case("favicon.ico", true)]
    #[case("style.css", false)]
    #[case("logo.svg.bak", false)]
    fn test_is_image(#[case] name: &str, #[case] expected: bool) {
        let scanner = ImageScanner::new().unwrap();
        assert_eq!(scanner.is_image(Path::new(name)), expected);
    }

    #[test]
    fn test_scan_is_recursive_and_filtered() {
        let dir = tempdir().unwrap();
        let icons = dir.path().join("icons");
        fs::create_dir_all(&icons).unwrap();
        fs::write(dir.path().join("logo.svg"), "<svg/>").unwrap();
        fs::write(icons.join("close.png"), "png").unwrap();
        fs::write(dir.path().join("readme.txt"), "text").unwrap();

        let scanner = ImageScanner::new().unwrap();
        let files = scanner.scan(dir.path());

        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.ends_with("logo.svg")));
        assert!(files.iter().any(|f| f.ends_with("icons/close.png")));
    }
}
