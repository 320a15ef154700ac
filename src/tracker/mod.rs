//! Shared "bytes freed" tracking across cleanup processes
//!
//! Background cleanup processes append one JSON line per operation to a
//! single tracking file. Appends are serialized with a lock-file marker.
//!
//! # Architecture
//!
//! - `SpaceRecord`: one operation's freed bytes, stamped with time and pid
//! - `FileLock`: exclusive create-if-absent marker, removed on drop
//! - `SpaceTracker`: appends records under the lock and aggregates them
//!
//! If the lock cannot be taken within the retry budget (50 × 100ms by
//! default) the record is appended without it. A rare interleaved line is
//! preferred over a lost record.

pub mod lock;
pub mod record;

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{Settings, SweepPaths};
use crate::error::{SweepError, SweepResult};

pub use lock::{FileLock, LockPolicy};
pub use record::SpaceRecord;

/// Aggregates freed bytes in a shared append-only file
#[derive(Debug, Clone)]
pub struct SpaceTracker {
    path: PathBuf,
    policy: LockPolicy,
}

impl SpaceTracker {
    /// Create a tracker for the file at `path`
    pub fn new(path: PathBuf, policy: LockPolicy) -> Self {
        Self { path, policy }
    }

    /// Create a tracker from the configured paths and settings
    pub fn from_settings(paths: &SweepPaths, settings: &Settings) -> Self {
        Self::new(
            paths.space_tracker_file(),
            LockPolicy::from_settings(&settings.tracker),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Append the bytes freed by one operation
    pub fn record(&self, operation: &str, bytes_freed: u64) -> SweepResult<SpaceRecord> {
        let record = SpaceRecord::new(operation, bytes_freed);
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock = FileLock::acquire(&self.lock_path(), self.policy);
        if lock.is_none() {
            warn!(
                path = %self.path.display(),
                attempts = self.policy.attempts,
                "Space tracker lock busy, appending without it"
            );
        }

        self.append(&line)?;
        drop(lock);

        debug!(operation, bytes_freed, "Recorded freed space");
        Ok(record)
    }

    fn append(&self, line: &str) -> SweepResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SweepError::Io(format!("Failed to open space tracker: {}", e)))?;

        // One write per record keeps lines whole even in the unlocked case
        file.write_all(line.as_bytes())
            .map_err(|e| SweepError::Io(format!("Failed to write space record: {}", e)))?;
        file.flush()
            .map_err(|e| SweepError::Io(format!("Failed to flush space tracker: {}", e)))?;

        Ok(())
    }

    /// Every readable record, oldest first
    ///
    /// Malformed lines (e.g. from an interleaved unlocked write) are skipped.
    pub fn records(&self) -> SweepResult<Vec<SpaceRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .map_err(|e| SweepError::Io(format!("Failed to open space tracker: {}", e)))?;

        let mut records = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                SweepError::Io(format!("Failed to read space tracker line {}: {}", line_num + 1, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = line_num + 1, error = %e, "Skipping malformed space record"),
            }
        }

        Ok(records)
    }

    /// Total bytes freed across all recorded operations
    pub fn total(&self) -> SweepResult<u64> {
        Ok(self.records()?.iter().map(|r| r.bytes_freed).sum())
    }

    /// Bytes freed per operation label
    pub fn by_operation(&self) -> SweepResult<BTreeMap<String, u64>> {
        let mut totals = BTreeMap::new();
        for record in self.records()? {
            *totals.entry(record.operation).or_insert(0) += record.bytes_freed;
        }
        Ok(totals)
    }

    /// Remove all records
    pub fn reset(&self) -> SweepResult<()> {
        let _lock = FileLock::acquire(&self.lock_path(), self.policy);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SweepError::Io(format!("Failed to reset space tracker: {}", e))),
        }
    }
}
