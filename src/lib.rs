//! SweepGuard - backup-guarded cleanup of caches, logs and temporary data
//!
//! This library provides the backup, manifest and restore core of the
//! SweepGuard cleanup utility. Nothing is deleted or truncated until a
//! verifiable copy of it has been recorded in a session manifest.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `logging`: tracing subscriber setup
//! - `storage`: Atomic JSON writes, free-space checks and session pruning
//! - `backup`: Backup engine, manifests, legacy migration and restore
//! - `tracker`: Shared "bytes freed" accounting across processes
//! - `cleanup`: The backup, then delete or truncate, cycle
//! - `jobs`: Background cleanup processes
//! - `cli`, `display`: Command handlers and terminal formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use sweepguard::config::{Settings, SweepPaths};
//!
//! let paths = SweepPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! ```

pub mod backup;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod storage;
pub mod tracker;

pub use error::SweepError;
