//! Custom error types for SweepGuard
//!
//! This module defines the error hierarchy for the backup, manifest and
//! restore subsystem using thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for SweepGuard operations
#[derive(Error, Debug)]
pub enum SweepError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Source path is missing or unreadable, so no backup can be taken
    #[error("Invalid source {}: {reason}", path.display())]
    InvalidSource { path: PathBuf, reason: String },

    /// Free space of the backing filesystem could not be determined
    #[error("Space check failed for {}: {reason}", path.display())]
    SpaceCheckFailed { path: PathBuf, reason: String },

    /// Neither the requested location nor the fallback root is usable
    #[error("Backup storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Free space is known and below what the backup needs
    #[error("Insufficient space for backup: need {required} bytes, have {available}")]
    InsufficientSpace { required: u64, available: u64 },

    /// The atomic manifest replace did not complete
    #[error("Manifest write failed: {0}")]
    ManifestWriteFailed(String),

    /// The manifest does not pass structural validation
    #[error("Manifest is corrupt: {}", path.display())]
    ManifestCorrupt { path: PathBuf },

    /// No digest implementation for the requested algorithm
    #[error("Checksum unavailable: {0}")]
    ChecksumUnavailable(String),

    /// The file to digest could not be read
    #[error("Checksum failed for {}: {reason}", path.display())]
    ChecksumFailed { path: PathBuf, reason: String },

    /// Restored state does not match the manifest entry
    #[error("Restore verification failed for {}: {reason}", path.display())]
    RestoreVerificationFailed { path: PathBuf, reason: String },

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// A batch finished with some items failed
    #[error("{operation} incomplete: {failed} of {total} item(s) failed")]
    Incomplete {
        operation: &'static str,
        failed: usize,
        total: usize,
    },
}

impl SweepError {
    /// Create a "not found" error for backup sessions
    pub fn session_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Session",
            identifier: identifier.into(),
        }
    }

    /// Create an "invalid source" error
    pub fn invalid_source(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a restore verification error
    pub fn restore_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::RestoreVerificationFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Checksum problems are evidence, never a blocking gate
    pub fn is_advisory(&self) -> bool {
        matches!(
            self,
            Self::ChecksumUnavailable(_) | Self::ChecksumFailed { .. }
        )
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for SweepError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for SweepGuard operations
pub type SweepResult<T> = Result<T, SweepError>;
