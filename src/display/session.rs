//! Session display formatting
//!
//! Formats sessions, manifest entries and verification results as tables.

use chrono::Utc;

use super::{format_duration, format_size};
use crate::backup::{ArtifactCheck, ArtifactStatus, BackupEntry, SessionInfo};

/// Format the session list, newest first, as a table
pub fn format_session_list(sessions: &[SessionInfo]) -> String {
    if sessions.is_empty() {
        return "No backup sessions found.".to_string();
    }

    let name_width = sessions
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(7)
        .max(7);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<name_width$}  {:>7}  {:>10}  {:>6}  {}\n",
        "Session",
        "Entries",
        "Size",
        "Age",
        "Status",
        name_width = name_width,
    ));
    output.push_str(&format!(
        "{:-<name_width$}  {:->7}  {:->10}  {:->6}  {:-<8}\n",
        "",
        "",
        "",
        "",
        "",
        name_width = name_width,
    ));

    let now = Utc::now();
    for session in sessions {
        let status = if session.legacy {
            "legacy"
        } else if session.valid {
            "ok"
        } else {
            "corrupt"
        };

        output.push_str(&format!(
            "{:<name_width$}  {:>7}  {:>10}  {:>6}  {}\n",
            session.name,
            session.entry_count,
            format_size(session.size_bytes),
            format_duration(now.signed_duration_since(session.created_at)),
            status,
            name_width = name_width,
        ));
    }

    output.push_str(&format!("\nTotal: {} session(s)\n", sessions.len()));
    output
}

/// Format the entries of one manifest
pub fn format_entry_list(entries: &[BackupEntry]) -> String {
    if entries.is_empty() {
        return "Manifest has no entries.".to_string();
    }

    let mut output = String::new();
    for entry in entries {
        output.push_str(&format!(
            "  [{}] {} ({}, {})\n",
            entry.entry_type,
            entry.original_path.display(),
            format_size(entry.size_bytes),
            entry.backup_file,
        ));
    }
    output
}

/// Format artifact verification results, one line per entry
pub fn format_check_list(checks: &[ArtifactCheck]) -> String {
    if checks.is_empty() {
        return "Manifest has no entries.".to_string();
    }

    let mut output = String::new();
    for check in checks {
        let status = match check.status {
            ArtifactStatus::Intact => "OK",
            ArtifactStatus::Unverified => "UNVERIFIED",
            ArtifactStatus::ChecksumMismatch => "MISMATCH",
            ArtifactStatus::Missing => "MISSING",
        };
        output.push_str(&format!(
            "  {:<10}  {}  ({})\n",
            status,
            check.original_path.display(),
            check.backup_file,
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session(name: &str, legacy: bool, valid: bool) -> SessionInfo {
        SessionInfo {
            name: name.to_string(),
            path: PathBuf::from("/backups").join(name),
            session_id: None,
            created_at: Utc::now(),
            entry_count: 2,
            size_bytes: 2048,
            legacy,
            valid,
        }
    }

    #[test]
    fn test_empty_session_list() {
        assert_eq!(format_session_list(&[]), "No backup sessions found.");
    }

    #[test]
    fn test_session_list_marks_status() {
        let output = format_session_list(&[
            session("20260101-000000-000-1", false, true),
            session("20250101-000000-000-2", true, false),
            session("20240101-000000-000-3", false, false),
        ]);

        assert!(output.contains("20260101-000000-000-1"));
        assert!(output.contains("2.0 KB"));
        assert!(output.contains("legacy"));
        assert!(output.contains("corrupt"));
        assert!(output.contains("Total: 3 session(s)"));
    }

    #[test]
    fn test_check_list() {
        let output = format_check_list(&[ArtifactCheck {
            entry_id: "a".to_string(),
            original_path: PathBuf::from("/tmp/x"),
            backup_file: "a_1".to_string(),
            status: ArtifactStatus::Missing,
        }]);
        assert!(output.contains("MISSING"));
        assert!(output.contains("/tmp/x"));
    }
}
