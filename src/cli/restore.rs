//! Restore CLI commands
//!
//! Implements restore, verification and legacy ledger migration.

use std::path::Path;

use clap::Subcommand;

use crate::backup::session::structured_manifest;
use crate::backup::{resolve_session_in, ArtifactStatus, ManifestFile, RestoreEngine};
use crate::config::{Settings, SweepPaths};
use crate::display::{format_check_list, format_entry_list};
use crate::error::{SweepError, SweepResult};

/// Restore subcommands
#[derive(Subcommand)]
pub enum RestoreCommands {
    /// Restore every entry of a session to its original path
    Restore {
        /// Session name or path (use 'latest' for most recent)
        session: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Check a session's artifacts without restoring
    Verify {
        /// Session name or path (use 'latest' for most recent)
        session: String,
    },

    /// Convert a session's legacy text ledger to the JSON manifest
    Migrate {
        /// Session name or path (use 'latest' for most recent)
        session: String,
    },
}

/// Handle a restore command
pub fn handle_restore_command(
    paths: &SweepPaths,
    settings: &Settings,
    cmd: RestoreCommands,
) -> SweepResult<()> {
    let engine = RestoreEngine::from_settings(settings);

    match cmd {
        RestoreCommands::Restore { session, force } => {
            let session_dir = resolve_session_in(&paths.session_roots(), &session)?;
            let manifest = structured_with_report(&session_dir)?;
            let entries = manifest.entries()?;

            println!("Session: {}", session_dir.display());
            println!("Entries: {}", entries.len());
            print!("{}", format_entry_list(&entries));
            println!();

            if !force {
                println!("WARNING: Existing files at these paths will be overwritten!");
                println!("To proceed, run again with --force flag:");
                println!("  sweepguard restore {} --force", session);
                return Ok(());
            }

            let report = engine.restore_manifest(manifest.path(), &session_dir)?;

            for path in &report.restored {
                println!("  RESTORED {}", path.display());
            }
            for failure in &report.failed {
                println!("  FAILED   {}: {}", failure.path.display(), failure.reason);
            }
            println!();
            println!("{}", report.summary());

            if !report.is_success() {
                println!();
                println!("Some items could not be restored. Check the paths above by hand;");
                println!("their backups remain in {}", session_dir.display());
                return Err(SweepError::Incomplete {
                    operation: "Restore",
                    failed: report.failed.len(),
                    total: report.restored_count() + report.failed.len(),
                });
            }
        }

        RestoreCommands::Verify { session } => {
            let session_dir = resolve_session_in(&paths.session_roots(), &session)?;
            structured_with_report(&session_dir)?;
            let checks = engine.verify_session(&session_dir)?;

            println!("Verifying {}", session_dir.display());
            print!("{}", format_check_list(&checks));

            let missing = checks
                .iter()
                .filter(|c| c.status == ArtifactStatus::Missing)
                .count();
            let mismatched = checks
                .iter()
                .filter(|c| c.status == ArtifactStatus::ChecksumMismatch)
                .count();

            println!();
            println!(
                "{} artifact(s): {} missing, {} checksum mismatch(es)",
                checks.len(),
                missing,
                mismatched
            );

            // A mismatch is evidence only; a missing artifact cannot be restored
            if missing > 0 {
                return Err(SweepError::Incomplete {
                    operation: "Verify",
                    failed: missing,
                    total: checks.len(),
                });
            }
        }

        RestoreCommands::Migrate { session } => {
            let session_dir = resolve_session_in(&paths.session_roots(), &session)?;
            let (manifest, report) = structured_manifest(&session_dir)?;

            match report {
                Some(report) if !report.already_migrated => {
                    println!("Migrated {} entr(ies) to {}", report.migrated, manifest.path().display());
                    if !report.skipped_lines.is_empty() {
                        println!("Skipped legacy line(s): {:?}", report.skipped_lines);
                    }
                }
                _ => println!("Session already has a structured manifest."),
            }
        }
    }

    Ok(())
}

/// The session's structured manifest, reporting a legacy migration if one ran
fn structured_with_report(session_dir: &Path) -> SweepResult<ManifestFile> {
    let (manifest, report) = structured_manifest(session_dir)?;
    if let Some(report) = report.filter(|r| !r.already_migrated) {
        println!(
            "Migrated legacy ledger: {} entr(ies), {} line(s) skipped",
            report.migrated,
            report.skipped_lines.len()
        );
    }
    Ok(manifest)
}
