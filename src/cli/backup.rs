//! Backup CLI commands
//!
//! Implements CLI commands for backup management.

use std::sync::Arc;

use clap::Subcommand;

use crate::audit::AuditAction;
use crate::backup::{BackupManager, BackupScheduler};
use crate::display::backup::format_backup_list;
use crate::error::{LedgerError, LedgerResult};
use crate::services::Ledger;

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a backup set now
    Create,

    /// List all backup sets
    List {
        /// Show every file in each set
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run periodic backups until interrupted
    Run {
        /// Minutes between backups (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

/// Handle a backup command
pub async fn handle_backup_command(ledger: &Ledger, cmd: BackupCommands) -> LedgerResult<()> {
    let settings = ledger.settings();
    let manager = BackupManager::new(ledger.paths(), settings.max_backup_sets);

    match cmd {
        BackupCommands::Create => {
            println!("Creating backup...");
            let result = manager.create_backup_with_retention();
            match &result {
                Ok((set, deleted)) => ledger.audit().info(
                    AuditAction::Backup,
                    None,
                    format!(
                        "stamp={} files={} pruned={}",
                        set.stamp,
                        set.files.len(),
                        deleted.len()
                    ),
                ),
                Err(e) => ledger.audit().error(AuditAction::Backup, None, e.to_string()),
            }
            let (set, deleted) = result?;

            if set.files.is_empty() {
                println!("Nothing to back up yet.");
            } else {
                println!("Backup created: {} ({} files)", set.stamp, set.files.len());
                println!("Location: {}", manager.backup_dir().display());
            }
            if !deleted.is_empty() {
                println!("Pruned {} old backup file(s)", deleted.len());
            }
        }

        BackupCommands::List { verbose } => {
            let sets = manager.list_backups()?;
            print!("{}", format_backup_list(&sets));

            if verbose {
                for set in &sets {
                    println!();
                    println!("{}:", set.stamp);
                    for file in &set.files {
                        println!("  {}", file.display());
                    }
                }
            }
        }

        BackupCommands::Run { interval } => {
            let period = match interval {
                Some(0) => {
                    return Err(LedgerError::Validation(
                        "Backup interval must be at least one minute".into(),
                    ))
                }
                Some(minutes) => std::time::Duration::from_secs(minutes * 60),
                None => settings.backup_interval(),
            };

            println!(
                "Backing up every {} minute(s) into {}. Press Ctrl-C to stop.",
                period.as_secs() / 60,
                manager.backup_dir().display()
            );

            let scheduler = BackupScheduler::start(manager, period, Arc::clone(ledger.audit()));
            tokio::signal::ctrl_c().await.map_err(|e| {
                LedgerError::Persistence(format!("Failed to listen for Ctrl-C: {}", e))
            })?;

            scheduler.shutdown().await;
            println!("Backup scheduler stopped.");
        }
    }

    Ok(())
}
