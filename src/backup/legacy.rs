//! One-way migration of the legacy flat-text ledger
//!
//! Older sessions kept `backup_manifest.txt` with one
//! `original_path|backup_name|backup_date` record per line. The first time
//! such a session is touched it is converted into the structured manifest;
//! the text ledger is never written again.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{info, warn};

use super::manifest::{
    BackupEntry, EntryStatus, EntryType, Manifest, ManifestFile, ARCHIVE_EXTENSION,
};
use crate::error::{SweepError, SweepResult};
use crate::storage::write_json_atomic;

/// File name of the legacy ledger inside a session directory
pub const LEGACY_MANIFEST_FILE_NAME: &str = "backup_manifest.txt";

const NAIVE_DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%d_%H%M%S",
    "%Y%m%d-%H%M%S",
];

/// Outcome of a legacy migration
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Entries written to the structured manifest
    pub migrated: usize,
    /// Line numbers (1-based) that could not be converted
    pub skipped_lines: Vec<usize>,
    /// The structured manifest already existed; nothing was done
    pub already_migrated: bool,
}

/// One parsed legacy ledger line
#[derive(Debug, Clone, PartialEq, Eq)]
struct LegacyRecord {
    original_path: PathBuf,
    backup_name: String,
    backup_date: DateTime<Utc>,
}

fn parse_line(line: &str) -> Result<LegacyRecord, String> {
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    let [path, name, date] = fields.as_slice() else {
        return Err(format!("expected 3 fields, found {}", fields.len()));
    };

    if path.is_empty() {
        return Err("empty original path".to_string());
    }
    if name.is_empty() {
        return Err("empty backup name".to_string());
    }

    Ok(LegacyRecord {
        original_path: PathBuf::from(path),
        backup_name: name.to_string(),
        backup_date: parse_date(date).ok_or_else(|| format!("unparseable date '{}'", date))?,
    })
}

fn parse_date(date: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Convert a legacy ledger at `old_path` into a structured manifest at
/// `new_path`.
///
/// An entry's type is `directory` when `<backup_name>.tar.gz` sits next to
/// the ledger, `file` otherwise. Lines that fail to parse are logged and
/// skipped. The whole manifest is written in one atomic replace.
pub fn migrate_legacy(old_path: &Path, new_path: &Path, session_id: &str) -> SweepResult<MigrationReport> {
    let target = ManifestFile::new(new_path);
    if target.validate() {
        info!(path = %new_path.display(), "Structured manifest already present, skipping migration");
        return Ok(MigrationReport {
            already_migrated: true,
            ..MigrationReport::default()
        });
    }

    let contents = fs::read_to_string(old_path).map_err(|e| {
        SweepError::Io(format!(
            "Failed to read legacy manifest {}: {}",
            old_path.display(),
            e
        ))
    })?;
    let legacy_dir = old_path.parent().unwrap_or_else(|| Path::new("."));

    let mut manifest = Manifest::new(session_id);
    let mut report = MigrationReport::default();

    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record = match parse_line(line) {
            Ok(record) => record,
            Err(reason) => {
                warn!(line = line_no, %reason, "Skipping legacy manifest line");
                report.skipped_lines.push(line_no);
                continue;
            }
        };

        let entry = legacy_entry(&manifest, legacy_dir, record);
        manifest.entries.push(entry);
        report.migrated += 1;
    }

    if let Some(first) = manifest.entries.first() {
        manifest.created_at = first.created_at;
    }

    write_json_atomic(new_path, &manifest)
        .map_err(|e| SweepError::ManifestWriteFailed(e.to_string()))?;

    info!(
        migrated = report.migrated,
        skipped = report.skipped_lines.len(),
        path = %new_path.display(),
        "Migrated legacy manifest"
    );
    Ok(report)
}

fn legacy_entry(manifest: &Manifest, legacy_dir: &Path, record: LegacyRecord) -> BackupEntry {
    let archive_name = format!("{}{}", record.backup_name, ARCHIVE_EXTENSION);
    let (backup_file, entry_type) = if legacy_dir.join(&archive_name).is_file() {
        (archive_name, EntryType::Directory)
    } else {
        (record.backup_name.clone(), EntryType::File)
    };

    let size_bytes = fs::metadata(legacy_dir.join(&backup_file))
        .map(|m| m.len())
        .unwrap_or(0);

    BackupEntry {
        id: manifest.unique_entry_id(&record.backup_name, record.backup_date),
        original_path: record.original_path,
        backup_name: record.backup_name,
        backup_file,
        entry_type,
        size_bytes,
        checksum: None,
        created_at: record.backup_date,
        status: EntryStatus::Completed,
    }
}
