//! Space tracker CLI commands

use clap::Subcommand;

use crate::config::{Settings, SweepPaths};
use crate::display::format_size;
use crate::error::SweepResult;
use crate::tracker::SpaceTracker;

/// Space subcommands
#[derive(Subcommand)]
pub enum SpaceCommands {
    /// Show space freed by cleanups
    Space {
        /// Clear all space records
        #[arg(long)]
        reset: bool,
    },
}

/// Handle a space command
pub fn handle_space_command(
    paths: &SweepPaths,
    settings: &Settings,
    cmd: SpaceCommands,
) -> SweepResult<()> {
    let tracker = SpaceTracker::from_settings(paths, settings);

    match cmd {
        SpaceCommands::Space { reset: true } => {
            tracker.reset()?;
            println!("Space records cleared.");
        }

        SpaceCommands::Space { reset: false } => {
            let by_operation = tracker.by_operation()?;
            let total: u64 = by_operation.values().sum();

            println!("Space Freed");
            println!("===========");
            if by_operation.is_empty() {
                println!("No cleanups recorded yet.");
                return Ok(());
            }

            let width = by_operation.keys().map(|k| k.len()).max().unwrap_or(9).max(9);
            for (operation, bytes) in &by_operation {
                println!("  {:<width$}  {:>10}", operation, format_size(*bytes), width = width);
            }
            println!();
            println!("Total: {} ({} bytes)", format_size(total), total);
        }
    }

    Ok(())
}
