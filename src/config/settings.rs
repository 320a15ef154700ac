//! User settings for SweepGuard
//!
//! Manages backup retention, integrity options, restore tolerances and the
//! lock-retry policy of the shared space tracker.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::SweepPaths;
use crate::error::SweepError;

/// Backup-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Number of most recent sessions kept by pruning
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Attach a sha256 digest to every artifact
    #[serde(default = "default_true")]
    pub checksums: bool,

    /// Extra free space required on top of the source size, in percent
    #[serde(default = "default_space_overhead_percent")]
    pub space_overhead_percent: u32,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            checksums: true,
            space_overhead_percent: default_space_overhead_percent(),
        }
    }
}

/// Restore-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreSettings {
    /// Size drift after restore that is tolerated without a warning, in percent
    #[serde(default = "default_size_tolerance_percent")]
    pub size_tolerance_percent: f64,
}

impl Default for RestoreSettings {
    fn default() -> Self {
        Self {
            size_tolerance_percent: default_size_tolerance_percent(),
        }
    }
}

/// Lock-retry policy for the shared space tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Attempts at taking the lock before appending unlocked
    #[serde(default = "default_lock_attempts")]
    pub lock_attempts: u32,

    /// Delay between lock attempts in milliseconds
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_ms: u64,
}

impl TrackerSettings {
    /// Delay between two lock attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms)
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            lock_attempts: default_lock_attempts(),
            lock_retry_ms: default_lock_retry_ms(),
        }
    }
}

/// User settings for SweepGuard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub backup: BackupSettings,

    #[serde(default)]
    pub restore: RestoreSettings,

    #[serde(default)]
    pub tracker: TrackerSettings,

    /// Default log filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_max_sessions() -> usize {
    10
}

fn default_space_overhead_percent() -> u32 {
    10
}

fn default_size_tolerance_percent() -> f64 {
    1.0
}

fn default_lock_attempts() -> u32 {
    50
}

fn default_lock_retry_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            backup: BackupSettings::default(),
            restore: RestoreSettings::default(),
            tracker: TrackerSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or use defaults if the file doesn't exist
    pub fn load_or_create(paths: &SweepPaths) -> Result<Self, SweepError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| SweepError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                SweepError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &SweepPaths) -> Result<(), SweepError> {
        paths.ensure_directories()?;
        crate::storage::write_json_atomic(paths.settings_file(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.backup.max_sessions, 10);
        assert!(settings.backup.checksums);
        assert_eq!(settings.backup.space_overhead_percent, 10);
        assert_eq!(settings.restore.size_tolerance_percent, 1.0);
        assert_eq!(settings.tracker.lock_attempts, 50);
        assert_eq!(settings.tracker.retry_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SweepPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.backup.max_sessions = 3;
        settings.tracker.lock_attempts = 5;

        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.backup.max_sessions, 3);
        assert_eq!(loaded.tracker.lock_attempts, 5);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SweepPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), r#"{"backup": {"checksums": false}}"#).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert!(!loaded.backup.checksums);
        assert_eq!(loaded.backup.max_sessions, 10);
        assert_eq!(loaded.log_level, "warn");
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SweepPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), "not json").unwrap();

        let err = Settings::load_or_create(&paths).unwrap_err();
        assert!(matches!(err, SweepError::Config(_)));
    }
}
