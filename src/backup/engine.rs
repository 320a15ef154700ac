//! Backup engine
//!
//! Captures a path into the current session before anything destructive
//! happens to it. A failed backup means no backup exists, and the caller
//! must leave the source alone.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::archive::create_archive;
use super::checksum::checksum;
use super::manifest::{BackupEntry, EntryStatus, EntryType, Manifest, ARCHIVE_EXTENSION};
use super::session::BackupSession;
use crate::config::{Settings, SweepPaths};
use crate::error::{SweepError, SweepResult};
use crate::storage::{path_size, SpaceStatus, StorageManager};

/// What a source looked like when it was inspected
#[derive(Debug, Clone)]
struct SourceInfo {
    path: PathBuf,
    entry_type: EntryType,
    size_bytes: u64,
    /// Stored as tar.gz rather than a plain copy
    archive: bool,
}

/// Creates artifacts and manifest entries for one session
#[derive(Debug)]
pub struct BackupEngine {
    storage: StorageManager,
    backup_root: PathBuf,
    checksums: bool,
    session: Option<BackupSession>,
}

impl BackupEngine {
    /// Create an engine writing sessions under `backup_root`
    pub fn new(storage: StorageManager, backup_root: PathBuf, checksums: bool) -> Self {
        Self {
            storage,
            backup_root,
            checksums,
            session: None,
        }
    }

    /// Create an engine from the configured paths and settings
    pub fn from_settings(paths: &SweepPaths, settings: &Settings) -> Self {
        Self::new(
            StorageManager::from_settings(paths, settings),
            paths.backup_root(),
            settings.backup.checksums,
        )
    }

    /// The session started by the first backup that passed the space check
    pub fn session(&self) -> Option<&BackupSession> {
        self.session.as_ref()
    }

    /// Back up `source` under `label`
    ///
    /// On success exactly one new artifact and one new manifest entry
    /// exist. On any error the manifest does not reference a new artifact
    /// and the caller must not delete or truncate `source`.
    pub fn backup(&mut self, source: &Path, label: &str) -> SweepResult<BackupEntry> {
        let info = inspect_source(source)?;

        // Checked before any session directory exists
        let space_target = self
            .session
            .as_ref()
            .map(|s| s.dir().to_path_buf())
            .unwrap_or_else(|| self.backup_root.clone());
        match self.storage.space_status(&space_target, info.size_bytes) {
            SpaceStatus::Sufficient { .. } => {}
            SpaceStatus::Unknown => {
                warn!(path = %info.path.display(), "Proceeding with backup without a confirmed space check");
            }
            SpaceStatus::Insufficient {
                available,
                required,
            } => {
                return Err(SweepError::InsufficientSpace {
                    required,
                    available,
                });
            }
        }

        let session = self.ensure_session()?.clone();
        let manifest = session.manifest();

        let created_at = Utc::now();
        let name = sanitize_label(label);
        let (id, backup_file) =
            allocate_artifact(&manifest.load()?, &name, &info, created_at, session.dir());
        let artifact = session.dir().join(&backup_file);

        write_artifact(&info, &artifact)?;

        let checksum = if self.checksums {
            match checksum(&artifact) {
                Ok(digest) => Some(digest),
                Err(e) => {
                    warn!(path = %artifact.display(), error = %e, "Artifact stored without checksum");
                    None
                }
            }
        } else {
            None
        };

        let entry = BackupEntry {
            id,
            original_path: info.path.clone(),
            backup_name: name,
            backup_file,
            entry_type: info.entry_type,
            size_bytes: info.size_bytes,
            checksum,
            created_at,
            status: EntryStatus::Completed,
        };

        if let Err(e) = manifest.add(&entry) {
            warn!(
                artifact = %artifact.display(),
                "Manifest append failed; artifact left as an orphan for pruning"
            );
            return Err(e);
        }

        info!(
            source = %info.path.display(),
            artifact = %artifact.display(),
            size = info.size_bytes,
            "Backup completed"
        );
        Ok(entry)
    }

    fn ensure_session(&mut self) -> SweepResult<&BackupSession> {
        if self.session.is_none() {
            self.session = Some(BackupSession::start(&self.storage, &self.backup_root)?);
        }
        self.session
            .as_ref()
            .ok_or_else(|| SweepError::StorageUnavailable("no backup session".to_string()))
    }
}

/// Check that `source` exists and can be read
fn inspect_source(source: &Path) -> SweepResult<SourceInfo> {
    let path = if source.is_absolute() {
        source.to_path_buf()
    } else {
        std::env::current_dir()?.join(source)
    };

    let metadata = fs::symlink_metadata(&path)
        .map_err(|e| SweepError::invalid_source(&path, e.to_string()))?;

    let (entry_type, archive) = if metadata.is_dir() {
        fs::read_dir(&path).map_err(|e| SweepError::invalid_source(&path, e.to_string()))?;
        (EntryType::Directory, true)
    } else if metadata.file_type().is_symlink() {
        (EntryType::File, true)
    } else {
        File::open(&path).map_err(|e| SweepError::invalid_source(&path, e.to_string()))?;
        // An empty plain copy would be an empty artifact
        (EntryType::File, metadata.len() == 0)
    };

    if path.file_name().is_none() {
        return Err(SweepError::invalid_source(&path, "path has no final component"));
    }

    Ok(SourceInfo {
        size_bytes: path_size(&path),
        path,
        entry_type,
        archive,
    })
}

/// Labels end up in file names, so keep them to a safe alphabet
fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "backup".to_string()
    } else {
        cleaned
    }
}

/// Pick an entry id and artifact name unused by the manifest and the
/// session directory
fn allocate_artifact(
    manifest: &Manifest,
    label: &str,
    info: &SourceInfo,
    created_at: DateTime<Utc>,
    session_dir: &Path,
) -> (String, String) {
    let base = manifest.unique_entry_id(label, created_at);
    let taken = |id: &str, file: &str| {
        manifest
            .entries
            .iter()
            .any(|e| e.id == id || e.backup_file == file)
            || session_dir.join(file).exists()
    };

    let mut id = base.clone();
    let mut n = 0u32;
    loop {
        let file = artifact_name(&id, info);
        if !taken(&id, &file) {
            return (id, file);
        }
        n += 1;
        id = format!("{}_{}", base, n);
    }
}

fn artifact_name(id: &str, info: &SourceInfo) -> String {
    if info.archive {
        format!("{}{}", id, ARCHIVE_EXTENSION)
    } else {
        let file_name = info
            .path
            .file_name()
            .map(|n| sanitize_label(&n.to_string_lossy()))
            .unwrap_or_default();
        format!("{}_{}", id, file_name)
    }
}

/// Write the artifact under a `.partial` name and rename it into place
fn write_artifact(info: &SourceInfo, artifact: &Path) -> SweepResult<()> {
    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let partial = artifact.with_file_name(format!(".{}.partial", file_name));

    let written = if info.archive {
        create_archive(&info.path, &partial)
    } else {
        fs::copy(&info.path, &partial)
            .map(|_| ())
            .map_err(|e| SweepError::Io(format!("Failed to copy {}: {}", info.path.display(), e)))
    };

    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    let len = fs::metadata(&partial).map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        let _ = fs::remove_file(&partial);
        return Err(SweepError::Io(format!(
            "Artifact for {} is empty",
            info.path.display()
        )));
    }

    let finalized = finalize_no_clobber(&partial, artifact);
    let _ = fs::remove_file(&partial);
    finalized?;

    debug!(artifact = %artifact.display(), bytes = len, "Artifact written");
    Ok(())
}

/// Move `partial` to `artifact`, failing if `artifact` already exists
fn finalize_no_clobber(partial: &Path, artifact: &Path) -> SweepResult<()> {
    match fs::hard_link(partial, artifact) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(SweepError::Io(format!(
            "Artifact {} already exists",
            artifact.display()
        ))),
        Err(e) => {
            // Filesystems without hard links get an existence check instead
            debug!(error = %e, "Hard link unavailable, renaming artifact");
            if artifact.exists() {
                return Err(SweepError::Io(format!(
                    "Artifact {} already exists",
                    artifact.display()
                )));
            }
            fs::rename(partial, artifact)
                .map_err(|e| SweepError::Io(format!("Failed to finalize artifact: {}", e)))
        }
    }
}
