//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the backup and tracker layers.

pub mod backup;
pub mod restore;
pub mod space;

pub use backup::{handle_backup_command, BackupCommands};
pub use restore::{handle_restore_command, RestoreCommands};
pub use space::{handle_space_command, SpaceCommands};
