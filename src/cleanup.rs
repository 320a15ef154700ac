//! Backup-guarded cleanup
//!
//! A destructive action only runs after its backup has been recorded.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::backup::{BackupEngine, BackupEntry};
use crate::error::{SweepError, SweepResult};
use crate::storage::path_size;
use crate::tracker::SpaceTracker;

/// What to do with a source once it is backed up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupAction {
    /// Remove the file or directory
    Delete,
    /// Empty a file, or a directory's contents, keeping the path itself
    Truncate,
}

/// Outcome of one cleanup
#[derive(Debug, Clone, Serialize)]
pub struct CleanupOutcome {
    pub entry: BackupEntry,
    pub action: CleanupAction,
    pub bytes_freed: u64,
}

/// Back up `source`, then delete or truncate it and record the freed bytes
///
/// If the backup fails the error is returned and `source` is not touched.
pub fn run(
    engine: &mut BackupEngine,
    tracker: &SpaceTracker,
    source: &Path,
    label: &str,
    action: CleanupAction,
) -> SweepResult<CleanupOutcome> {
    let entry = engine.backup(source, label)?;
    let target = entry.original_path.clone();

    let before = path_size(&target);
    match action {
        CleanupAction::Delete => delete(&target)?,
        CleanupAction::Truncate => truncate(&target)?,
    }
    let after = if target.exists() { path_size(&target) } else { 0 };
    let bytes_freed = before.saturating_sub(after);

    if let Err(e) = tracker.record(label, bytes_freed) {
        warn!(operation = label, error = %e, "Freed space not recorded");
    }

    info!(
        path = %target.display(),
        ?action,
        bytes_freed,
        "Cleanup completed"
    );

    Ok(CleanupOutcome {
        entry,
        action,
        bytes_freed,
    })
}

fn delete(path: &Path) -> SweepResult<()> {
    let metadata = fs::symlink_metadata(path)?;
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| SweepError::Io(format!("Failed to delete {}: {}", path.display(), e)))
}

fn truncate(path: &Path) -> SweepResult<()> {
    let metadata = fs::symlink_metadata(path)?;

    if metadata.is_dir() {
        for entry in fs::read_dir(path)? {
            let child = entry?.path();
            delete(&child)?;
        }
        return Ok(());
    }

    if metadata.file_type().is_symlink() {
        return delete(path);
    }

    fs::OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_len(0))
        .map_err(|e| SweepError::Io(format!("Failed to truncate {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::RestoreEngine;
    use crate::storage::StorageManager;
    use crate::tracker::LockPolicy;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> (BackupEngine, SpaceTracker) {
        let engine = BackupEngine::new(
            StorageManager::new(temp.path().join("fallback"), 10),
            temp.path().join("backups"),
            true,
        );
        let tracker = SpaceTracker::new(
            temp.path().join("space_saved.jsonl"),
            LockPolicy::new(5, Duration::from_millis(1)),
        );
        (engine, tracker)
    }

    #[test]
    fn test_delete_directory_records_freed_bytes() {
        let temp = TempDir::new().unwrap();
        let (mut engine, tracker) = setup(&temp);

        let cache = temp.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("a"), vec![0u8; 300]).unwrap();
        fs::write(cache.join("b"), vec![0u8; 200]).unwrap();

        let outcome = run(&mut engine, &tracker, &cache, "x_cache", CleanupAction::Delete).unwrap();

        assert!(!cache.exists());
        assert_eq!(outcome.bytes_freed, 500);
        assert_eq!(tracker.total().unwrap(), 500);
    }

    #[test]
    fn test_truncate_file_keeps_path() {
        let temp = TempDir::new().unwrap();
        let (mut engine, tracker) = setup(&temp);

        let log = temp.path().join("app.log");
        fs::write(&log, vec![b'x'; 1024]).unwrap();

        let outcome = run(&mut engine, &tracker, &log, "app_log", CleanupAction::Truncate).unwrap();

        assert!(log.is_file());
        assert_eq!(fs::metadata(&log).unwrap().len(), 0);
        assert_eq!(outcome.bytes_freed, 1024);
    }

    #[test]
    fn test_truncate_directory_empties_it() {
        let temp = TempDir::new().unwrap();
        let (mut engine, tracker) = setup(&temp);

        let logs = temp.path().join("logs");
        fs::create_dir_all(logs.join("old")).unwrap();
        fs::write(logs.join("old").join("1.log"), b"12345").unwrap();
        fs::write(logs.join("2.log"), b"678").unwrap();

        run(&mut engine, &tracker, &logs, "logs", CleanupAction::Truncate).unwrap();

        assert!(logs.is_dir());
        assert_eq!(fs::read_dir(&logs).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_backup_records_nothing() {
        let temp = TempDir::new().unwrap();
        let (mut engine, tracker) = setup(&temp);

        let missing = temp.path().join("does-not-exist");
        let err = run(&mut engine, &tracker, &missing, "gone", CleanupAction::Delete).unwrap_err();

        assert!(matches!(err, SweepError::InvalidSource { .. }));
        assert_eq!(tracker.total().unwrap(), 0);
    }

    #[test]
    fn test_deleted_source_can_be_restored() {
        let temp = TempDir::new().unwrap();
        let (mut engine, tracker) = setup(&temp);

        let cache = temp.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("entry"), b"cached").unwrap();

        run(&mut engine, &tracker, &cache, "cache", CleanupAction::Delete).unwrap();
        let session_dir = engine.session().unwrap().dir().to_path_buf();

        let report = RestoreEngine::new(1.0).restore_session(&session_dir).unwrap();
        assert!(report.is_success());
        assert_eq!(fs::read(cache.join("entry")).unwrap(), b"cached");
    }
}
