//! Background cleanup jobs
//!
//! Each target is cleaned by a separate `sweepguard clean` child process.
//! The handles are kept and awaited directly; completion is never inferred
//! from PID liveness.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::paths::{SweepPaths, DATA_DIR_ENV};
use crate::error::{SweepError, SweepResult};

#[derive(Debug)]
struct CleanupJob {
    target: PathBuf,
    child: Child,
}

/// How one background job ended
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub target: PathBuf,
    pub pid: u32,
    /// Exit code, `None` if killed by a signal or never awaited
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl JobResult {
    fn from_status(target: PathBuf, pid: u32, status: ExitStatus) -> Self {
        Self {
            target,
            pid,
            exit_code: status.code(),
            success: status.success(),
        }
    }
}

/// Cleanup child processes launched by this process
#[derive(Debug)]
pub struct BackgroundJobs {
    program: PathBuf,
    data_dir: PathBuf,
    jobs: Vec<CleanupJob>,
}

impl BackgroundJobs {
    /// Launch jobs with `program`, sharing `data_dir` with this process
    pub fn new(program: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            program,
            data_dir,
            jobs: Vec::new(),
        }
    }

    /// Launch jobs by re-running the current executable
    pub fn for_current_exe(paths: &SweepPaths) -> SweepResult<Self> {
        let program = std::env::current_exe()
            .map_err(|e| SweepError::Io(format!("Cannot locate own executable: {}", e)))?;
        Ok(Self::new(program, paths.base_dir().clone()))
    }

    /// Start a child cleaning `target`; returns its pid
    pub fn spawn(&mut self, target: &Path, label: Option<&str>, truncate: bool) -> SweepResult<u32> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("clean")
            .arg(target)
            .env(DATA_DIR_ENV, &self.data_dir)
            .stdin(Stdio::null());
        if let Some(label) = label {
            cmd.arg("--label").arg(label);
        }
        if truncate {
            cmd.arg("--truncate");
        }

        let child = cmd.spawn().map_err(|e| {
            SweepError::Io(format!(
                "Failed to start cleanup job for {}: {}",
                target.display(),
                e
            ))
        })?;

        let pid = child.id();
        debug!(pid, target = %target.display(), "Cleanup job started");
        self.jobs.push(CleanupJob {
            target: target.to_path_buf(),
            child,
        });
        Ok(pid)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Block until every job has exited, in launch order
    pub fn wait_all(self) -> Vec<JobResult> {
        self.jobs
            .into_iter()
            .map(|mut job| {
                let pid = job.child.id();
                match job.child.wait() {
                    Ok(status) => {
                        info!(pid, target = %job.target.display(), %status, "Cleanup job finished");
                        JobResult::from_status(job.target, pid, status)
                    }
                    Err(e) => {
                        error!(pid, target = %job.target.display(), error = %e, "Failed to wait for cleanup job");
                        JobResult {
                            target: job.target,
                            pid,
                            exit_code: None,
                            success: false,
                        }
                    }
                }
            })
            .collect()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wait_all_reports_each_exit_status() {
        let temp = TempDir::new().unwrap();
        let mut ok = BackgroundJobs::new(PathBuf::from("true"), temp.path().to_path_buf());
        ok.spawn(Path::new("/tmp/a"), Some("a"), false).unwrap();
        ok.spawn(Path::new("/tmp/b"), None, true).unwrap();
        assert_eq!(ok.len(), 2);

        let results = ok.wait_all();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results[0].target, PathBuf::from("/tmp/a"));
        assert_eq!(results[1].exit_code, Some(0));

        let mut failing = BackgroundJobs::new(PathBuf::from("false"), temp.path().to_path_buf());
        failing.spawn(Path::new("/tmp/c"), None, false).unwrap();
        let results = failing.wait_all();
        assert!(!results[0].success);
        assert_eq!(results[0].exit_code, Some(1));
    }

    #[test]
    fn test_spawn_missing_program_fails() {
        let temp = TempDir::new().unwrap();
        let mut jobs = BackgroundJobs::new(
            temp.path().join("no-such-binary"),
            temp.path().to_path_buf(),
        );
        assert!(jobs.spawn(Path::new("/tmp/a"), None, false).is_err());
        assert!(jobs.is_empty());
    }
}
