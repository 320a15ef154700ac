//! Path management for SweepGuard
//!
//! Provides XDG-compliant path resolution for settings, backup sessions and
//! the shared space-tracking file.
//!
//! ## Path Resolution Order
//!
//! 1. `SWEEPGUARD_DATA_DIR` environment variable (if set)
//! 2. `$XDG_DATA_HOME/sweepguard` (if set)
//! 3. Platform data directory (e.g. `~/.local/share/sweepguard`)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::SweepError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "SWEEPGUARD_DATA_DIR";

/// Manages all paths used by SweepGuard
#[derive(Debug, Clone)]
pub struct SweepPaths {
    /// Base directory for all SweepGuard data
    base_dir: PathBuf,
}

impl SweepPaths {
    /// Create a new SweepPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no home or data directory can be determined.
    pub fn new() -> Result<Self, SweepError> {
        let base_dir = if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create SweepPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Root under which one directory per backup session is created
    pub fn backup_root(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Used when the backup root cannot be created or written
    pub fn fallback_root(&self) -> PathBuf {
        std::env::temp_dir().join("sweepguard-backups")
    }

    /// Every directory that may hold sessions, primary root first
    pub fn session_roots(&self) -> Vec<PathBuf> {
        vec![self.backup_root(), self.fallback_root()]
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Shared "bytes freed" ledger written by every cleanup process
    pub fn space_tracker_file(&self) -> PathBuf {
        self.base_dir.join("space_saved.jsonl")
    }

    /// Ensure the base and backup directories exist
    pub fn ensure_directories(&self) -> Result<(), SweepError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| SweepError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.backup_root())
            .map_err(|e| SweepError::Io(format!("Failed to create backup directory: {}", e)))?;

        Ok(())
    }
}

/// Resolve the default data directory path based on platform
fn resolve_default_path() -> Result<PathBuf, SweepError> {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("sweepguard"));
        }
    }

    ProjectDirs::from("", "", "sweepguard")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| SweepError::Config("Could not determine a data directory".into()))
}
