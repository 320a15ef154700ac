//! Storage layer for SweepGuard
//!
//! Provides JSON file storage with atomic writes, and the storage manager
//! that picks, measures and prunes backup locations.

pub mod file_io;
pub mod manager;
pub mod usage;

pub use file_io::{read_json_required, write_json_atomic};
pub use manager::{SpaceStatus, StorageManager};
pub use usage::path_size;
