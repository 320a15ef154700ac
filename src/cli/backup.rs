//! Backup CLI commands
//!
//! Implements backup, cleanup, session listing and pruning.

use std::path::{Path, PathBuf};

use clap::Subcommand;

use crate::backup::{list_sessions_in, BackupEngine, ManifestFile};
use crate::cleanup::{self, CleanupAction};
use crate::config::{Settings, SweepPaths};
use crate::display::{format_entry_list, format_session_list, format_size};
use crate::error::{SweepError, SweepResult};
use crate::jobs::BackgroundJobs;
use crate::storage::StorageManager;
use crate::tracker::SpaceTracker;

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Back up a path without touching it
    Backup {
        /// File or directory to back up
        path: PathBuf,

        /// Label used in artifact names (defaults to the file name)
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Back up paths, then delete or truncate them
    Clean {
        /// Files or directories to clean
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Label used in artifact names and space records
        #[arg(short, long)]
        label: Option<String>,

        /// Empty files and directories instead of deleting them
        #[arg(short, long)]
        truncate: bool,

        /// Clean each path in its own background process
        #[arg(short, long)]
        background: bool,
    },

    /// List backup sessions
    Sessions {
        /// Show the entries of each session
        #[arg(short, long)]
        verbose: bool,
    },

    /// Delete old sessions beyond the retention limit
    Prune {
        /// Sessions to keep (defaults to the configured maximum)
        #[arg(short, long)]
        keep: Option<usize>,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Handle a backup command
pub fn handle_backup_command(
    paths: &SweepPaths,
    settings: &Settings,
    cmd: BackupCommands,
) -> SweepResult<()> {
    match cmd {
        BackupCommands::Backup { path, label } => {
            let label = label.unwrap_or_else(|| default_label(&path));
            let mut engine = BackupEngine::from_settings(paths, settings);
            let entry = engine.backup(&path, &label)?;

            println!("Backed up: {}", entry.original_path.display());
            println!("Size: {}", format_size(entry.size_bytes));
            if let Some(session) = engine.session() {
                println!("Session: {}", session.dir().display());
            }
        }

        BackupCommands::Clean {
            paths: targets,
            label,
            truncate,
            background,
        } => {
            if background {
                clean_in_background(paths, &targets, label.as_deref(), truncate)?;
            } else {
                clean_in_foreground(paths, settings, &targets, label.as_deref(), truncate)?;
            }
        }

        BackupCommands::Sessions { verbose } => {
            let sessions = list_sessions_in(&paths.session_roots())?;

            if sessions.is_empty() {
                println!("No backup sessions found.");
                println!("Create one with: sweepguard backup <path>");
                return Ok(());
            }

            println!("Backup Sessions");
            println!("===============");
            println!();
            print!("{}", format_session_list(&sessions));

            let root = paths.backup_root();
            let fallback: Vec<_> = sessions.iter().filter(|s| !s.path.starts_with(&root)).collect();
            if !fallback.is_empty() {
                println!();
                println!("Stored in the fallback location {}:", paths.fallback_root().display());
                for session in fallback {
                    println!("  {}", session.name);
                }
            }

            if verbose {
                for session in sessions.iter().filter(|s| s.valid) {
                    let entries = ManifestFile::in_session(&session.path).entries()?;
                    println!();
                    println!("{}:", session.name);
                    print!("{}", format_entry_list(&entries));
                }
            }
        }

        BackupCommands::Prune { keep, force } => {
            let keep = keep.unwrap_or(settings.backup.max_sessions);
            let storage = StorageManager::from_settings(paths, settings);
            let root = paths.backup_root();
            let candidates = storage.prune_candidates(&root, keep)?;

            if candidates.is_empty() {
                println!("No sessions to prune.");
                println!("Retention: keep {} most recent session(s)", keep);
                return Ok(());
            }

            println!("Prune Summary");
            println!("=============");
            println!("Retention: keep {} most recent session(s)", keep);
            println!("To be deleted: {} session(s)", candidates.len());
            for path in &candidates {
                println!("  {}", path.display());
            }
            println!();

            if !force {
                println!("To delete old sessions, run again with --force flag:");
                println!("  sweepguard prune --keep {} --force", keep);
                return Ok(());
            }

            let deleted = storage.prune_old_sessions(&root, keep)?;
            println!("Deleted {} session(s).", deleted.len());
        }
    }

    Ok(())
}

fn clean_in_foreground(
    paths: &SweepPaths,
    settings: &Settings,
    targets: &[PathBuf],
    label: Option<&str>,
    truncate: bool,
) -> SweepResult<()> {
    let action = if truncate {
        CleanupAction::Truncate
    } else {
        CleanupAction::Delete
    };
    let mut engine = BackupEngine::from_settings(paths, settings);
    let tracker = SpaceTracker::from_settings(paths, settings);

    let mut failed = 0;
    let mut freed = 0;
    for target in targets {
        let label = label
            .map(str::to_string)
            .unwrap_or_else(|| default_label(target));

        match cleanup::run(&mut engine, &tracker, target, &label, action) {
            Ok(outcome) => {
                freed += outcome.bytes_freed;
                println!(
                    "Cleaned: {} ({} freed)",
                    outcome.entry.original_path.display(),
                    format_size(outcome.bytes_freed)
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("Skipped {}: {}", target.display(), e);
            }
        }
    }

    println!();
    println!("Freed {} across {} path(s)", format_size(freed), targets.len() - failed);
    if let Some(session) = engine.session() {
        println!("Backups: {}", session.dir().display());
    }

    if failed > 0 {
        return Err(SweepError::Incomplete {
            operation: "Cleanup",
            failed,
            total: targets.len(),
        });
    }
    Ok(())
}

fn clean_in_background(
    paths: &SweepPaths,
    targets: &[PathBuf],
    label: Option<&str>,
    truncate: bool,
) -> SweepResult<()> {
    let mut jobs = BackgroundJobs::for_current_exe(paths)?;
    let mut not_started = 0;
    for target in targets {
        // Jobs already running must still be awaited
        match jobs.spawn(target, label, truncate) {
            Ok(pid) => println!("Started cleanup of {} (pid {})", target.display(), pid),
            Err(e) => {
                not_started += 1;
                eprintln!("{}", e);
            }
        }
    }

    println!("Waiting for {} job(s)...", jobs.len());
    let results = jobs.wait_all();

    let failed = not_started + results.iter().filter(|r| !r.success).count();
    for result in results.iter().filter(|r| !r.success) {
        let code = result
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        eprintln!("Job for {} failed (exit {})", result.target.display(), code);
    }

    println!("{} of {} job(s) succeeded", targets.len() - failed, targets.len());

    if failed > 0 {
        return Err(SweepError::Incomplete {
            operation: "Background cleanup",
            failed,
            total: targets.len(),
        });
    }
    Ok(())
}

/// Label derived from the final path component
fn default_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "backup".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_label() {
        assert_eq!(default_label(Path::new("/tmp/x/cache")), "cache");
        assert_eq!(default_label(Path::new("/")), "backup");
    }
}
