//! Filesystem helpers shared by the cache and the build orchestrator.

use std::io::Write;
use std::path::Path;

/// Atomically writes `contents` to `path`.
///
/// The data goes to a uniquely named temporary file in the destination
/// directory which is then renamed over `path`. Readers see either the old
/// file or the complete new one. Concurrent writers each use their own
/// temporary file; the last rename wins.
///
/// The parent directory must already exist.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Same directory keeps the rename on one filesystem
    let temp_file = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(parent_dir)?;

    let (mut file, temp_path) = temp_file.into_parts();
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    temp_path
        .persist(path)
        .map_err(|e| std::io::Error::other(format!("failed to persist temp file: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn writes_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");

        atomic_write(&path, b"hello").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old contents that are longer").unwrap();

        atomic_write(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");

        atomic_write(&path, b"a").unwrap();
        atomic_write(&path, b"b").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["out.txt".to_string()]);
    }

    #[test]
    fn fails_when_parent_is_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");

        assert!(atomic_write(&path, b"data").is_err());
        assert!(!path.exists());
    }
}
