//! Configuration module for SweepGuard
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - User settings persistence
//! - Backup, restore and tracker tuning knobs

pub mod paths;
pub mod settings;

pub use paths::SweepPaths;
pub use settings::Settings;
