//! Disk usage queries

use std::path::Path;

use walkdir::WalkDir;

/// Apparent size of a file, or the sum of all files under a directory
///
/// Symlinks are counted as links, not followed. Unreadable entries are
/// skipped, so the result is best-effort.
pub fn path_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .filter(|metadata| !metadata.is_dir())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_size() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f");
        fs::write(&path, vec![0u8; 1234]).unwrap();
        assert_eq!(path_size(&path), 1234);
    }

    #[test]
    fn test_directory_size_is_recursive() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a").join("b")).unwrap();
        fs::write(temp.path().join("a").join("one"), vec![1u8; 10]).unwrap();
        fs::write(temp.path().join("a").join("b").join("two"), vec![2u8; 32]).unwrap();
        assert_eq!(path_size(temp.path()), 42);
    }

    #[test]
    fn test_missing_path_is_zero() {
        let temp = TempDir::new().unwrap();
        assert_eq!(path_size(&temp.path().join("missing")), 0);
    }
}
