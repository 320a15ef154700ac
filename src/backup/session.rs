//! Backup sessions
//!
//! A session is one cleanup run's directory under the backup root, holding
//! one manifest and the artifacts it references. Only the process that
//! started a session ever writes to it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::legacy::{migrate_legacy, MigrationReport, LEGACY_MANIFEST_FILE_NAME};
use super::manifest::{ManifestFile, MANIFEST_FILE_NAME};
use crate::error::{SweepError, SweepResult};
use crate::storage::{path_size, StorageManager};

/// strftime format of session directory names (a pid suffix follows)
const SESSION_DIR_FORMAT: &str = "%Y%m%d-%H%M%S-%3f";

/// A session that this process is writing to
#[derive(Debug, Clone)]
pub struct BackupSession {
    id: String,
    dir: PathBuf,
    manifest: ManifestFile,
}

impl BackupSession {
    /// Create a fresh session directory with an empty manifest
    ///
    /// The directory name carries the start time and this process id, so
    /// concurrent cleanup processes never share a session.
    pub fn start(storage: &StorageManager, backup_root: &Path) -> SweepResult<Self> {
        let name = format!(
            "{}-{}",
            Utc::now().format(SESSION_DIR_FORMAT),
            std::process::id()
        );
        let dir = storage.ensure_dir(&backup_root.join(name))?;

        let id = Uuid::new_v4().to_string();
        let manifest = ManifestFile::in_session(&dir);
        manifest.init(&id)?;

        debug!(session = %id, dir = %dir.display(), "Started backup session");
        Ok(Self { id, dir, manifest })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &ManifestFile {
        &self.manifest
    }
}

/// Summary of a session for listing
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Directory name under its session root
    pub name: String,
    pub path: PathBuf,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub entry_count: usize,
    /// Bytes on disk used by the session directory
    pub size_bytes: u64,
    /// Only the legacy text ledger is present
    pub legacy: bool,
    /// The structured manifest passes validation
    pub valid: bool,
}

/// Every session under `backup_root`, newest first
///
/// Directories holding neither manifest format are ignored. Listing never
/// writes; legacy sessions are reported as such.
pub fn list_sessions(backup_root: &Path) -> SweepResult<Vec<SessionInfo>> {
    list_sessions_in(&[backup_root.to_path_buf()])
}

/// Every session under any of `roots`, newest first
///
/// Used to include sessions written to the fallback root.
pub fn list_sessions_in(roots: &[PathBuf]) -> SweepResult<Vec<SessionInfo>> {
    let mut sessions = Vec::new();
    for root in roots {
        if !root.is_dir() {
            continue;
        }
        for entry in fs::read_dir(root)
            .map_err(|e| SweepError::Io(format!("Failed to read backup directory: {}", e)))?
        {
            let entry = entry
                .map_err(|e| SweepError::Io(format!("Failed to read directory entry: {}", e)))?;
            let path = entry.path();
            if path.is_dir() {
                if let Some(info) = session_info(&path) {
                    sessions.push(info);
                }
            }
        }
    }

    sessions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.name.cmp(&a.name))
    });

    Ok(sessions)
}

fn session_info(dir: &Path) -> Option<SessionInfo> {
    let name = dir.file_name()?.to_string_lossy().to_string();
    let manifest = ManifestFile::in_session(dir);
    let legacy_path = dir.join(LEGACY_MANIFEST_FILE_NAME);

    let modified: DateTime<Utc> = fs::metadata(dir)
        .and_then(|m| m.modified())
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());

    let mut info = SessionInfo {
        name,
        path: dir.to_path_buf(),
        session_id: None,
        created_at: modified,
        entry_count: 0,
        size_bytes: path_size(dir),
        legacy: false,
        valid: false,
    };

    if manifest.exists() {
        if let Ok(doc) = manifest.load() {
            info.session_id = Some(doc.session_id);
            info.created_at = doc.created_at;
            info.entry_count = doc.entries.len();
            info.valid = true;
        }
    } else if legacy_path.is_file() {
        info.legacy = true;
        info.entry_count = fs::read_to_string(&legacy_path)
            .map(|c| c.lines().filter(|l| !l.trim().is_empty()).count())
            .unwrap_or(0);
    } else {
        return None;
    }

    Some(info)
}

/// Resolve `latest`, a session directory name, or a path to a session dir
pub fn resolve_session(backup_root: &Path, query: &str) -> SweepResult<PathBuf> {
    resolve_session_in(&[backup_root.to_path_buf()], query)
}

/// Like [`resolve_session`], searching each of `roots` in order
pub fn resolve_session_in(roots: &[PathBuf], query: &str) -> SweepResult<PathBuf> {
    if query.eq_ignore_ascii_case("latest") {
        return list_sessions_in(roots)?
            .into_iter()
            .next()
            .map(|s| s.path)
            .ok_or_else(|| SweepError::session_not_found("latest"));
    }

    if let Some(named) = roots.iter().map(|r| r.join(query)).find(|p| p.is_dir()) {
        return Ok(named);
    }

    let path = PathBuf::from(query);
    if path.is_dir() {
        return Ok(path);
    }

    Err(SweepError::session_not_found(query))
}

/// The structured manifest of a session, migrating a legacy ledger first
/// if that is all the session has
pub fn structured_manifest(session_dir: &Path) -> SweepResult<(ManifestFile, Option<MigrationReport>)> {
    let manifest = ManifestFile::in_session(session_dir);
    if manifest.exists() {
        return Ok((manifest, None));
    }

    let legacy = session_dir.join(LEGACY_MANIFEST_FILE_NAME);
    if !legacy.is_file() {
        return Err(SweepError::NotFound {
            entity_type: "Manifest",
            identifier: session_dir.join(MANIFEST_FILE_NAME).display().to_string(),
        });
    }

    let session_id = session_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let report = migrate_legacy(&legacy, manifest.path(), &session_id)?;
    Ok((manifest, Some(report)))
}
