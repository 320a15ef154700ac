//! Backup storage management
//!
//! Resolves a writable location for backup sessions, checks free space with
//! a safety margin and prunes old sessions.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{Settings, SweepPaths};
use crate::error::{SweepError, SweepResult};

/// Outcome of a free-space check against a required size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceStatus {
    /// Enough space including the overhead margin
    Sufficient { available: u64, required: u64 },
    /// Space is known and too small
    Insufficient { available: u64, required: u64 },
    /// The query failed; callers must not read this as "empty"
    Unknown,
}

/// Resolves and maintains backup storage
#[derive(Debug, Clone)]
pub struct StorageManager {
    fallback_root: PathBuf,
    overhead_percent: u32,
}

impl StorageManager {
    /// Create a StorageManager with an explicit fallback root and margin
    pub fn new(fallback_root: PathBuf, overhead_percent: u32) -> Self {
        Self {
            fallback_root,
            overhead_percent,
        }
    }

    /// Create a StorageManager from the configured paths and settings
    pub fn from_settings(paths: &SweepPaths, settings: &Settings) -> Self {
        Self::new(paths.fallback_root(), settings.backup.space_overhead_percent)
    }

    /// Free bytes on the filesystem backing `target_dir`
    ///
    /// Missing directories are resolved to their nearest existing ancestor.
    pub fn check_space(&self, target_dir: &Path) -> SweepResult<u64> {
        let existing = nearest_existing_ancestor(target_dir).ok_or_else(|| {
            SweepError::SpaceCheckFailed {
                path: target_dir.to_path_buf(),
                reason: "no existing ancestor".to_string(),
            }
        })?;

        fs2::available_space(existing).map_err(|e| SweepError::SpaceCheckFailed {
            path: target_dir.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Bytes that must be free to store `bytes` of backup data
    pub fn required_with_overhead(&self, bytes: u64) -> u64 {
        required_with_overhead(bytes, self.overhead_percent)
    }

    /// Compare free space in `dir` against `required_bytes` plus margin
    pub fn space_status(&self, dir: &Path, required_bytes: u64) -> SpaceStatus {
        let required = self.required_with_overhead(required_bytes);
        match self.check_space(dir) {
            Ok(available) => {
                if meets_requirement(available, required_bytes, self.overhead_percent) {
                    SpaceStatus::Sufficient { available, required }
                } else {
                    SpaceStatus::Insufficient { available, required }
                }
            }
            Err(e) => {
                warn!(error = %e, "Free space check inconclusive");
                SpaceStatus::Unknown
            }
        }
    }

    /// True only when free space is known to cover `required_bytes` plus margin
    pub fn has_space(&self, dir: &Path, required_bytes: u64) -> bool {
        matches!(
            self.space_status(dir, required_bytes),
            SpaceStatus::Sufficient { .. }
        )
    }

    /// Create `path` (and ancestors), falling back to a fresh timestamped
    /// directory under the fallback root when `path` is unusable.
    pub fn ensure_dir(&self, path: &Path) -> SweepResult<PathBuf> {
        match create_writable(path) {
            Ok(()) => return Ok(path.to_path_buf()),
            Err(e) => warn!(path = %path.display(), error = %e, "Backup directory unusable, trying fallback"),
        }

        let fallback = self
            .fallback_root
            .join(Utc::now().format("%Y%m%d-%H%M%S-%3f").to_string());

        create_writable(&fallback).map_err(|e| {
            SweepError::StorageUnavailable(format!(
                "neither {} nor fallback {} is usable: {}",
                path.display(),
                fallback.display(),
                e
            ))
        })?;

        info!(path = %fallback.display(), "Using fallback backup directory");
        Ok(fallback)
    }

    /// Session directories beyond the `max_sessions` most recent, newest first
    pub fn prune_candidates(&self, base_dir: &Path, max_sessions: usize) -> SweepResult<Vec<PathBuf>> {
        Ok(sessions_by_mtime(base_dir)?
            .into_iter()
            .skip(max_sessions)
            .map(|(path, _)| path)
            .collect())
    }

    /// Delete every session directory beyond the `max_sessions` most recent
    ///
    /// Must not run while a backup is writing into `base_dir`.
    pub fn prune_old_sessions(&self, base_dir: &Path, max_sessions: usize) -> SweepResult<Vec<PathBuf>> {
        let mut deleted = Vec::new();

        for path in self.prune_candidates(base_dir, max_sessions)? {
            fs::remove_dir_all(&path).map_err(|e| {
                SweepError::Io(format!(
                    "Failed to delete old session {}: {}",
                    path.display(),
                    e
                ))
            })?;
            debug!(path = %path.display(), "Pruned session");
            deleted.push(path);
        }

        Ok(deleted)
    }
}

/// `required * (100 + overhead_percent) / 100`, rounded up
pub fn required_with_overhead(required: u64, overhead_percent: u32) -> u64 {
    let scaled = required as u128 * (100 + overhead_percent as u128);
    let total = (scaled + 99) / 100;
    u64::try_from(total).unwrap_or(u64::MAX)
}

/// Whether `available` covers `required` plus the overhead margin
pub fn meets_requirement(available: u64, required: u64, overhead_percent: u32) -> bool {
    available >= required_with_overhead(required, overhead_percent)
}

fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.exists())
}

fn create_writable(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;

    let marker = path.join(format!(".write-check-{}", std::process::id()));
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&marker)?;
    fs::remove_file(&marker)
}

/// Session directories under `base_dir`, newest first
fn sessions_by_mtime(base_dir: &Path) -> SweepResult<Vec<(PathBuf, SystemTime)>> {
    if !base_dir.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in fs::read_dir(base_dir)
        .map_err(|e| SweepError::Io(format!("Failed to read backup directory: {}", e)))?
    {
        let entry =
            entry.map_err(|e| SweepError::Io(format!("Failed to read directory entry: {}", e)))?;
        let metadata = entry.metadata()?;
        if !metadata.is_dir() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        sessions.push((entry.path(), modified));
    }

    sessions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> StorageManager {
        StorageManager::new(temp.path().join("fallback"), 10)
    }

    #[test]
    fn test_required_with_overhead_boundaries() {
        assert_eq!(required_with_overhead(0, 10), 0);
        assert_eq!(required_with_overhead(1, 10), 2);
        assert_eq!(required_with_overhead(100, 10), 110);
        assert_eq!(required_with_overhead(1000, 10), 1100);
        assert_eq!(required_with_overhead(1000, 0), 1000);
        assert_eq!(required_with_overhead(u64::MAX, 10), u64::MAX);
    }

    #[test]
    fn test_meets_requirement_boundaries() {
        // available must be >= 1.10 * N
        assert!(meets_requirement(110, 100, 10));
        assert!(!meets_requirement(109, 100, 10));
        assert!(meets_requirement(111, 100, 10));
        assert!(meets_requirement(0, 0, 10));
        assert!(!meets_requirement(0, 1, 10));
        assert!(!meets_requirement(1, 1, 10));
        assert!(meets_requirement(2, 1, 10));
        assert!(!meets_requirement(u64::MAX - 1, u64::MAX, 10));
    }

    #[test]
    fn test_has_space_on_real_filesystem() {
        let temp = TempDir::new().unwrap();
        let storage = manager(&temp);
        assert!(storage.check_space(temp.path()).unwrap() > 0);

        assert!(storage.has_space(temp.path(), 0));
        assert!(!storage.has_space(temp.path(), u64::MAX / 2));
    }

    #[test]
    fn test_check_space_uses_existing_ancestor() {
        let temp = TempDir::new().unwrap();
        let storage = manager(&temp);

        let missing = temp.path().join("not").join("yet").join("there");
        assert!(storage.check_space(&missing).unwrap() > 0);
    }

    #[test]
    fn test_space_status_insufficient() {
        let temp = TempDir::new().unwrap();
        let storage = manager(&temp);

        let status = storage.space_status(temp.path(), u64::MAX / 2);
        assert!(matches!(status, SpaceStatus::Insufficient { .. }));
    }

    #[test]
    fn test_ensure_dir_creates_requested_path() {
        let temp = TempDir::new().unwrap();
        let storage = manager(&temp);

        let wanted = temp.path().join("a").join("b");
        let resolved = storage.ensure_dir(&wanted).unwrap();
        assert_eq!(resolved, wanted);
        assert!(wanted.is_dir());
        assert_eq!(fs::read_dir(&wanted).unwrap().count(), 0);
    }

    #[test]
    fn test_ensure_dir_falls_back() {
        let temp = TempDir::new().unwrap();
        let storage = manager(&temp);

        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();

        let resolved = storage.ensure_dir(&blocker.join("session")).unwrap();
        assert!(resolved.starts_with(temp.path().join("fallback")));
        assert!(resolved.is_dir());
    }

    #[test]
    fn test_ensure_dir_unavailable() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let storage = StorageManager::new(blocker.join("fallback"), 10);

        let err = storage.ensure_dir(&blocker.join("session")).unwrap_err();
        assert!(matches!(err, SweepError::StorageUnavailable(_)));
    }

    #[test]
    fn test_prune_keeps_most_recent() {
        let temp = TempDir::new().unwrap();
        let storage = manager(&temp);
        let base = temp.path().join("backups");

        for i in 0..5 {
            fs::create_dir_all(base.join(format!("session-{}", i))).unwrap();
            std::thread::sleep(Duration::from_millis(20));
        }
        fs::write(base.join("stray.txt"), b"not a session").unwrap();

        let deleted = storage.prune_old_sessions(&base, 2).unwrap();
        assert_eq!(deleted.len(), 3);
        assert!(base.join("session-4").exists());
        assert!(base.join("session-3").exists());
        assert!(!base.join("session-0").exists());
        assert!(base.join("stray.txt").exists());
    }

    #[test]
    fn test_prune_missing_base_is_noop() {
        let temp = TempDir::new().unwrap();
        let storage = manager(&temp);

        let deleted = storage
            .prune_old_sessions(&temp.path().join("nothing"), 1)
            .unwrap();
        assert!(deleted.is_empty());
    }
}
