//! End-to-end tests for the backup, cleanup and restore cycle

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use sweepguard::backup::{list_sessions, BackupEngine, ManifestFile, RestoreEngine};
use sweepguard::cleanup::{self, CleanupAction};
use sweepguard::config::{Settings, SweepPaths};
use sweepguard::tracker::SpaceTracker;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Test context with an isolated data directory and a scratch tree
struct TestContext {
    _temp_dir: TempDir,
    paths: SweepPaths,
    settings: Settings,
    scratch: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let paths = SweepPaths::with_base_dir(temp_dir.path().join("data"));
        let scratch = temp_dir.path().join("scratch");
        fs::create_dir_all(&scratch).expect("failed to create scratch dir");
        Self {
            _temp_dir: temp_dir,
            paths,
            settings: Settings::default(),
            scratch,
        }
    }

    fn engine(&self) -> BackupEngine {
        BackupEngine::from_settings(&self.paths, &self.settings)
    }

    fn tracker(&self) -> SpaceTracker {
        SpaceTracker::from_settings(&self.paths, &self.settings)
    }
}

/// Relative path -> file contents for every regular file under `root`
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn test_cleanup_then_restore_recreates_tree() {
    let ctx = TestContext::new();
    let cache = ctx.scratch.join("x").join("cache");
    fs::create_dir_all(cache.join("nested/deeper")).unwrap();
    fs::write(cache.join("index"), b"index data").unwrap();
    fs::write(cache.join("nested/blob.bin"), vec![42u8; 4096]).unwrap();
    fs::write(cache.join("nested/deeper/empty"), b"").unwrap();
    let log = ctx.scratch.join("app.log");
    fs::write(&log, b"line 1\nline 2\n").unwrap();

    let cache_before = snapshot(&cache);

    let mut engine = ctx.engine();
    let tracker = ctx.tracker();
    cleanup::run(&mut engine, &tracker, &cache, "x_cache", CleanupAction::Delete).unwrap();
    cleanup::run(&mut engine, &tracker, &log, "app_log", CleanupAction::Delete).unwrap();
    assert!(!cache.exists());
    assert!(!log.exists());
    assert_eq!(tracker.total().unwrap(), 10 + 4096 + 14);

    let session_dir = engine.session().unwrap().dir().to_path_buf();
    let report = RestoreEngine::from_settings(&ctx.settings)
        .restore_session(&session_dir)
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.restored_count(), 2);
    assert_eq!(snapshot(&cache), cache_before);
    assert_eq!(fs::read(&log).unwrap(), b"line 1\nline 2\n");
}

#[test]
fn test_restore_is_repeatable() {
    let ctx = TestContext::new();
    let file = ctx.scratch.join("settings.db");
    fs::write(&file, b"original").unwrap();

    let mut engine = ctx.engine();
    engine.backup(&file, "db").unwrap();
    let session_dir = engine.session().unwrap().dir().to_path_buf();

    fs::write(&file, b"changed").unwrap();
    let restore = RestoreEngine::from_settings(&ctx.settings);
    assert!(restore.restore_session(&session_dir).unwrap().is_success());
    assert!(restore.restore_session(&session_dir).unwrap().is_success());
    assert_eq!(fs::read(&file).unwrap(), b"original");
}

#[test]
fn test_missing_artifact_does_not_block_others() {
    let ctx = TestContext::new();
    let targets: Vec<PathBuf> = (0..3).map(|i| ctx.scratch.join(format!("f{}", i))).collect();
    for (i, t) in targets.iter().enumerate() {
        fs::write(t, format!("content {}", i)).unwrap();
    }

    let mut engine = ctx.engine();
    let tracker = ctx.tracker();
    for t in &targets {
        cleanup::run(&mut engine, &tracker, t, "f", CleanupAction::Delete).unwrap();
    }

    let session = engine.session().unwrap();
    let entries = session.manifest().entries().unwrap();
    fs::remove_file(session.dir().join(&entries[1].backup_file)).unwrap();

    let report = RestoreEngine::from_settings(&ctx.settings)
        .restore_session(session.dir())
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.restored_count(), 2);
    assert_eq!(report.failed_paths(), vec![targets[1].as_path()]);
    assert!(targets[0].exists());
    assert!(!targets[1].exists());
    assert!(targets[2].exists());
}

#[test]
fn test_sessions_are_listed_newest_first() {
    let ctx = TestContext::new();
    let file = ctx.scratch.join("a");
    fs::write(&file, b"a").unwrap();

    let mut first = ctx.engine();
    first.backup(&file, "a").unwrap();
    let first_dir = first.session().unwrap().dir().to_path_buf();

    thread::sleep(std::time::Duration::from_millis(20));

    let mut second = ctx.engine();
    second.backup(&file, "a").unwrap();
    let second_dir = second.session().unwrap().dir().to_path_buf();

    let sessions = list_sessions(&ctx.paths.backup_root()).unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].path, second_dir);
    assert_eq!(sessions[1].path, first_dir);
    assert!(sessions.iter().all(|s| s.valid && s.entry_count == 1));
    assert!(ManifestFile::in_session(&first_dir).validate());
}

#[test]
fn test_concurrent_tracker_appends_are_not_lost() {
    let ctx = TestContext::new();
    let tracker = Arc::new(ctx.tracker());

    let handles: Vec<_> = (1..=20u64)
        .map(|i| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                tracker.record(&format!("op{}", i % 4), i).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records = tracker.records().unwrap();
    assert_eq!(records.len(), 20);
    assert_eq!(tracker.total().unwrap(), (1..=20u64).sum::<u64>());
    assert_eq!(tracker.by_operation().unwrap().len(), 4);
}
