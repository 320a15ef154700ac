//! Per-session backup manifest
//!
//! The manifest is a JSON document listing every artifact in one session
//! directory. It only ever grows, and every append replaces the whole file
//! atomically so a reader never observes a half-written entry.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SweepError, SweepResult};
use crate::storage::{read_json_required, write_json_atomic};

/// Schema version of the structured manifest format
pub const MANIFEST_VERSION: &str = "2.0";

/// File name of the manifest inside a session directory
pub const MANIFEST_FILE_NAME: &str = "backup_manifest.json";

/// Suffix of artifacts stored as gzip-compressed tar archives
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// Top-level fields a manifest must carry to be considered well-formed
const REQUIRED_FIELDS: [&str; 3] = ["version", "session_id", "entries"];

/// Kind of filesystem object that was backed up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::File => write!(f, "file"),
            EntryType::Directory => write!(f, "directory"),
        }
    }
}

/// Persisted entry status; entries are written only once complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Completed,
}

/// One backed-up path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// `backup_name` plus creation timestamp, unique within a manifest
    pub id: String,
    /// Absolute source path at backup time
    pub original_path: PathBuf,
    /// Human-readable label such as `chrome_cache`
    pub backup_name: String,
    /// Artifact file name relative to the session directory
    pub backup_file: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Best-effort size of the source at capture time
    pub size_bytes: u64,
    /// `sha256:<hex>` digest of the artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: EntryStatus,
}

impl BackupEntry {
    /// Whether the artifact is a tar.gz archive rather than a plain copy
    pub fn is_archive(&self) -> bool {
        self.backup_file.ends_with(ARCHIVE_EXTENSION)
    }
}

/// The manifest document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<BackupEntry>,
}

impl Manifest {
    /// Create an empty manifest for a session
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            session_id: session_id.into(),
            created_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    /// Build an entry id that no existing entry uses
    pub fn unique_entry_id(&self, backup_name: &str, at: DateTime<Utc>) -> String {
        let base = format!("{}_{}", backup_name, at.format("%Y%m%d%H%M%S%3f"));
        let taken = |id: &str| self.entries.iter().any(|e| e.id == id);

        if !taken(&base) {
            return base;
        }
        (1..)
            .map(|n| format!("{}_{}", base, n))
            .find(|id| !taken(id))
            .unwrap_or(base)
    }

    /// Total captured size of every entry
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }
}

/// A manifest document on disk
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    /// Manifest stored at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The manifest belonging to a session directory
    pub fn in_session(session_dir: &Path) -> Self {
        Self::new(session_dir.join(MANIFEST_FILE_NAME))
    }

    /// Path of the manifest document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that artifact names are relative to
    pub fn session_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write a fresh, empty manifest, creating the parent directory first
    pub fn init(&self, session_id: &str) -> SweepResult<Manifest> {
        let manifest = Manifest::new(session_id);
        self.write(&manifest)?;
        debug!(path = %self.path.display(), session_id, "Initialized manifest");
        Ok(manifest)
    }

    /// Read and structurally validate the manifest
    pub fn load(&self) -> SweepResult<Manifest> {
        if !self.validate() {
            return Err(SweepError::ManifestCorrupt {
                path: self.path.clone(),
            });
        }

        read_json_required(&self.path).map_err(|_| SweepError::ManifestCorrupt {
            path: self.path.clone(),
        })
    }

    /// Append one entry with an atomic whole-document replace
    ///
    /// The entry's artifact must already exist in the session directory
    /// and be non-empty. On error the previous document is left intact and
    /// the entry must be treated as not recorded.
    pub fn add(&self, entry: &BackupEntry) -> SweepResult<()> {
        let artifact = self.session_dir().join(&entry.backup_file);
        let artifact_len = fs::metadata(&artifact).map(|m| m.len()).unwrap_or(0);
        if artifact_len == 0 {
            return Err(SweepError::ManifestWriteFailed(format!(
                "artifact {} is missing or empty",
                artifact.display()
            )));
        }

        let mut manifest = self.load()?;
        if manifest.entries.iter().any(|e| e.id == entry.id) {
            return Err(SweepError::ManifestWriteFailed(format!(
                "duplicate entry id {}",
                entry.id
            )));
        }

        manifest.entries.push(entry.clone());
        self.write(&manifest)?;
        debug!(id = %entry.id, path = %self.path.display(), "Appended manifest entry");
        Ok(())
    }

    /// Every entry, in the order it was added
    pub fn entries(&self) -> SweepResult<Vec<BackupEntry>> {
        Ok(self.load()?.entries)
    }

    /// Cheap well-formedness check
    ///
    /// The document must parse and carry the required top-level fields with
    /// `entries` as an array. Entries are not checked against the disk.
    pub fn validate(&self) -> bool {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return false;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&contents) else {
            return false;
        };
        let Some(object) = value.as_object() else {
            return false;
        };

        REQUIRED_FIELDS.iter().all(|f| object.contains_key(*f))
            && object["entries"].is_array()
    }

    fn write(&self, manifest: &Manifest) -> SweepResult<()> {
        write_json_atomic(&self.path, manifest)
            .map_err(|e| SweepError::ManifestWriteFailed(e.to_string()))
    }
}
