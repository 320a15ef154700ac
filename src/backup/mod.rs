//! Backup, manifest and restore subsystem
//!
//! Every destructive cleanup action is preceded by a backup into the
//! current session. A session can later be restored in a separate process.
//!
//! # Architecture
//!
//! - `checksum`: sha256 digests of artifacts (advisory verification)
//! - `manifest`: the per-session JSON ledger, appended by atomic replace
//! - `legacy`: one-way migration of the old pipe-delimited ledger
//! - `session`: session directories, listing and lookup
//! - `archive`: tar.gz artifacts for directories and empty files
//! - `engine`: `BackupEngine`, the fail-closed backup step
//! - `restore`: `RestoreEngine`, per-entry fail-open restore
//!
//! # Session Layout
//!
//! ```text
//! <backup_root>/<timestamp>-<pid>/
//!     backup_manifest.json
//!     <entry id>_<file name>      plain copy of a file
//!     <entry id>.tar.gz           archived directory
//! ```
//!
//! An entry id is `<label>_<timestamp>`, suffixed `_1`, `_2`, ... when the
//! id or its artifact name is already taken in the session. Sessions created
//! under the fallback root have the same layout.
//!
//! # Example
//!
//! ```rust,ignore
//! use sweepguard::backup::{BackupEngine, RestoreEngine};
//! use sweepguard::config::{Settings, SweepPaths};
//!
//! let paths = SweepPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//!
//! let mut engine = BackupEngine::from_settings(&paths, &settings);
//! engine.backup(Path::new("/tmp/x/cache"), "x_cache")?;
//!
//! // Later, in another process
//! let restore = RestoreEngine::from_settings(&settings);
//! let report = restore.restore_session(&session_dir)?;
//! println!("{}", report.summary());
//! ```

pub mod archive;
pub mod checksum;
pub mod engine;
pub mod legacy;
pub mod manifest;
pub mod restore;
pub mod session;

pub use engine::BackupEngine;
pub use legacy::{migrate_legacy, MigrationReport};
pub use manifest::{BackupEntry, EntryStatus, EntryType, Manifest, ManifestFile};
pub use restore::{ArtifactCheck, ArtifactStatus, RestoreEngine, RestoreFailure, RestoreReport};
pub use session::{
    list_sessions, list_sessions_in, resolve_session, resolve_session_in, BackupSession, SessionInfo,
};
