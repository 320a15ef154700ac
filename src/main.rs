use anyhow::Result;
use clap::{Parser, Subcommand};

use sweepguard::cli::{
    handle_backup_command, handle_restore_command, handle_space_command, BackupCommands,
    RestoreCommands, SpaceCommands,
};
use sweepguard::config::{Settings, SweepPaths};

#[derive(Parser)]
#[command(
    name = "sweepguard",
    version,
    about = "Backup-guarded cleanup of caches, logs and temporary data",
    long_about = "SweepGuard deletes or truncates caches, logs and temporary data, \
                  but only after a verifiable backup of each target has been \
                  recorded, so every cleanup can be undone."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Backups(BackupCommands),

    #[command(flatten)]
    Restores(RestoreCommands),

    #[command(flatten)]
    Space(SpaceCommands),

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = SweepPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    sweepguard::logging::init(&settings.log_level)?;

    match cli.command {
        Some(Commands::Backups(cmd)) => handle_backup_command(&paths, &settings, cmd)?,
        Some(Commands::Restores(cmd)) => handle_restore_command(&paths, &settings, cmd)?,
        Some(Commands::Space(cmd)) => handle_space_command(&paths, &settings, cmd)?,
        Some(Commands::Config) => {
            println!("SweepGuard Configuration");
            println!("========================");
            println!("Data directory:     {}", paths.base_dir().display());
            println!("Backup directory:   {}", paths.backup_root().display());
            println!("Fallback directory: {}", paths.fallback_root().display());
            println!("Settings file:      {}", paths.settings_file().display());
            println!("Space tracker:      {}", paths.space_tracker_file().display());
            println!();
            println!("Settings:");
            println!("  Max sessions:        {}", settings.backup.max_sessions);
            println!("  Checksums:           {}", settings.backup.checksums);
            println!("  Space overhead:      {}%", settings.backup.space_overhead_percent);
            println!("  Size tolerance:      {}%", settings.restore.size_tolerance_percent);
            println!(
                "  Tracker lock:        {} x {}ms",
                settings.tracker.lock_attempts, settings.tracker.lock_retry_ms
            );
            println!("  Log level:           {}", settings.log_level);
        }
        None => {
            println!("SweepGuard - backup-guarded cleanup");
            println!();
            println!("Run 'sweepguard --help' for usage information.");
        }
    }

    Ok(())
}
