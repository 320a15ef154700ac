//! Cross-process lock built on exclusive file creation
//!
//! Whoever creates the marker file owns the lock; dropping the guard
//! removes the marker.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::config::settings::TrackerSettings;

/// How long to keep trying for a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl LockPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn from_settings(settings: &TrackerSettings) -> Self {
        Self::new(settings.lock_attempts, settings.retry_delay())
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::from_settings(&TrackerSettings::default())
    }
}

/// Held lock; the marker file is removed on drop
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Try once to create the marker at `path`
    ///
    /// Returns `Ok(None)` when another process holds the lock.
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                // Owner pid is informational only
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Some(Self {
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Retry according to `policy`; `None` once every attempt failed
    pub fn acquire(path: &Path, policy: LockPolicy) -> Option<Self> {
        for attempt in 1..=policy.attempts.max(1) {
            match Self::try_acquire(path) {
                Ok(Some(lock)) => return Some(lock),
                Ok(None) => {}
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Lock attempt failed");
                }
            }
            if attempt < policy.attempts {
                std::thread::sleep(policy.delay);
            }
        }
        None
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tracker.lock");

        let lock = FileLock::try_acquire(&path).unwrap().unwrap();
        assert!(path.exists());
        assert!(FileLock::try_acquire(&path).unwrap().is_none());

        drop(lock);
        assert!(!path.exists());
        assert!(FileLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn test_acquire_gives_up_after_attempts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tracker.lock");
        let _held = FileLock::try_acquire(&path).unwrap().unwrap();

        let policy = LockPolicy::new(3, Duration::from_millis(1));
        assert!(FileLock::acquire(&path, policy).is_none());
        assert!(path.exists());
    }

    #[test]
    fn test_acquire_waits_for_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tracker.lock");
        let held = FileLock::try_acquire(&path).unwrap().unwrap();

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            drop(held);
        });

        let policy = LockPolicy::new(50, Duration::from_millis(10));
        assert!(FileLock::acquire(&path, policy).is_some());
        releaser.join().unwrap();
    }

    #[test]
    fn test_default_policy_ceiling() {
        let policy = LockPolicy::default();
        assert_eq!(policy.attempts, 50);
        assert_eq!(policy.delay * policy.attempts, Duration::from_secs(5));
    }
}
