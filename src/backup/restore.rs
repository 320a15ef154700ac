//! Backup restoration for SweepGuard
//!
//! Rebuilds original paths from a session's manifest. Entries are restored
//! independently: one bad entry is recorded and skipped so the rest of the
//! session can still be recovered.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use super::archive::extract_archive;
use super::checksum::{try_verify, verify};
use super::manifest::{BackupEntry, EntryType, ManifestFile};
use super::session::structured_manifest;
use crate::config::Settings;
use crate::error::{SweepError, SweepResult};
use crate::storage::path_size;

/// An entry that could not be restored
#[derive(Debug, Clone, Serialize)]
pub struct RestoreFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of restoring a whole session
#[derive(Debug, Default, Clone, Serialize)]
pub struct RestoreReport {
    /// Original paths that were recreated
    pub restored: Vec<PathBuf>,
    /// Entries that failed, in manifest order
    pub failed: Vec<RestoreFailure>,
}

impl RestoreReport {
    /// The session restore failed iff any entry failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn restored_count(&self) -> usize {
        self.restored.len()
    }

    pub fn failed_paths(&self) -> Vec<&Path> {
        self.failed.iter().map(|f| f.path.as_path()).collect()
    }

    /// Get a summary of what was restored
    pub fn summary(&self) -> String {
        format!(
            "Restored {} of {} item(s), {} failed",
            self.restored.len(),
            self.restored.len() + self.failed.len(),
            self.failed.len()
        )
    }
}

/// Integrity state of one artifact, without restoring it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Present and matching its recorded checksum
    Intact,
    /// Present, no checksum recorded or computable
    Unverified,
    ChecksumMismatch,
    Missing,
}

/// Verification result for one manifest entry
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactCheck {
    pub entry_id: String,
    pub original_path: PathBuf,
    pub backup_file: String,
    pub status: ArtifactStatus,
}

/// Handles restoring from backup sessions
#[derive(Debug, Clone)]
pub struct RestoreEngine {
    size_tolerance_percent: f64,
}

impl RestoreEngine {
    /// Create a RestoreEngine with the given post-restore size tolerance
    pub fn new(size_tolerance_percent: f64) -> Self {
        Self {
            size_tolerance_percent,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.restore.size_tolerance_percent)
    }

    /// Restore every entry of the session in `session_dir`
    ///
    /// A session holding only a legacy ledger is migrated first.
    pub fn restore_session(&self, session_dir: &Path) -> SweepResult<RestoreReport> {
        let (manifest, _) = structured_manifest(session_dir)?;
        self.restore_manifest(manifest.path(), session_dir)
    }

    /// Restore every entry of the manifest at `manifest_path`, whose
    /// artifacts live in `session_dir`
    pub fn restore_manifest(&self, manifest_path: &Path, session_dir: &Path) -> SweepResult<RestoreReport> {
        let manifest = ManifestFile::new(manifest_path);
        let entries = manifest.entries()?;

        let mut report = RestoreReport::default();
        if entries.is_empty() {
            info!(manifest = %manifest_path.display(), "Nothing to restore");
            return Ok(report);
        }

        for entry in &entries {
            match self.restore_one(entry, session_dir) {
                Ok(()) => {
                    info!(path = %entry.original_path.display(), "Restored");
                    report.restored.push(entry.original_path.clone());
                }
                Err(e) => {
                    error!(path = %entry.original_path.display(), error = %e, "Restore failed");
                    report.failed.push(RestoreFailure {
                        path: entry.original_path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Restore a single entry to its original path
    pub fn restore_one(&self, entry: &BackupEntry, session_dir: &Path) -> SweepResult<()> {
        let target = &entry.original_path;
        if !target.is_absolute() {
            return Err(SweepError::restore_failed(target, "original path is not absolute"));
        }

        let artifact = artifact_path(entry, session_dir)?;
        if !artifact.is_file() {
            return Err(SweepError::restore_failed(
                target,
                format!("artifact {} is missing", artifact.display()),
            ));
        }

        if let Some(expected) = &entry.checksum {
            // Advisory: a mismatch is logged by `verify` and the restore continues
            verify(&artifact, expected);
        }

        let parent = target
            .parent()
            .ok_or_else(|| SweepError::restore_failed(target, "original path has no parent"))?;
        fs::create_dir_all(parent).map_err(|e| {
            SweepError::restore_failed(target, format!("cannot create {}: {}", parent.display(), e))
        })?;

        if entry.is_archive() {
            extract_archive(&artifact, parent)
                .map_err(|e| SweepError::restore_failed(target, e.to_string()))?;
        } else {
            // Replace a symlink at the target rather than writing through it
            if fs::symlink_metadata(target).map_or(false, |m| m.file_type().is_symlink()) {
                fs::remove_file(target)
                    .map_err(|e| SweepError::restore_failed(target, e.to_string()))?;
            }
            fs::copy(&artifact, target)
                .map_err(|e| SweepError::restore_failed(target, e.to_string()))?;
        }

        self.verify_restored(entry)
    }

    /// Check existence and type; size drift is only a warning
    fn verify_restored(&self, entry: &BackupEntry) -> SweepResult<()> {
        let target = &entry.original_path;
        let metadata = fs::symlink_metadata(target)
            .map_err(|_| SweepError::restore_failed(target, "path does not exist after restore"))?;

        let type_matches = match entry.entry_type {
            EntryType::Directory => metadata.is_dir(),
            EntryType::File => !metadata.is_dir(),
        };
        if !type_matches {
            return Err(SweepError::restore_failed(
                target,
                format!("expected a {}", entry.entry_type),
            ));
        }

        let actual = path_size(target);
        if !within_tolerance(entry.size_bytes, actual, self.size_tolerance_percent) {
            warn!(
                path = %target.display(),
                expected = entry.size_bytes,
                actual,
                "Restored size differs from backup"
            );
        }

        Ok(())
    }

    /// Check every artifact of a session without restoring anything
    pub fn verify_session(&self, session_dir: &Path) -> SweepResult<Vec<ArtifactCheck>> {
        let (manifest, _) = structured_manifest(session_dir)?;

        let checks = manifest
            .entries()?
            .into_iter()
            .map(|entry| {
                let status = match artifact_path(&entry, session_dir) {
                    Ok(artifact) if artifact.is_file() => match &entry.checksum {
                        Some(expected) => match try_verify(&artifact, expected) {
                            Ok(true) => ArtifactStatus::Intact,
                            Ok(false) => ArtifactStatus::ChecksumMismatch,
                            Err(_) => ArtifactStatus::Unverified,
                        },
                        None => ArtifactStatus::Unverified,
                    },
                    _ => ArtifactStatus::Missing,
                };

                ArtifactCheck {
                    entry_id: entry.id,
                    original_path: entry.original_path,
                    backup_file: entry.backup_file,
                    status,
                }
            })
            .collect();

        Ok(checks)
    }
}

/// Artifact names must stay inside the session directory
fn artifact_path(entry: &BackupEntry, session_dir: &Path) -> SweepResult<PathBuf> {
    let name = Path::new(&entry.backup_file);
    let mut components = name.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(session_dir.join(name)),
        _ => Err(SweepError::restore_failed(
            &entry.original_path,
            format!("artifact name '{}' is not a plain file name", entry.backup_file),
        )),
    }
}

/// Whether `actual` is within `tolerance_percent` of `expected`
fn within_tolerance(expected: u64, actual: u64, tolerance_percent: f64) -> bool {
    if expected == 0 {
        return true;
    }
    let drift = expected.abs_diff(actual) as f64 / expected as f64 * 100.0;
    drift <= tolerance_percent
}
