use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ledger::audit::AuditLogger;
use ledger::cli::{
    handle_account_command, handle_audit_command, handle_backup_command, handle_loan_command,
    handle_transaction_command, handle_verify_command,
};
use ledger::config::{paths::LedgerPaths, settings::Settings};
use ledger::services::Ledger;

#[derive(Parser)]
#[command(
    name = "ledger",
    author = "Kaylee Beyene",
    version,
    about = "Single-node account ledger",
    long_about = "A single-node account ledger: accounts with an append-only \
                  transaction history, loans with fixed monthly payments, an \
                  audit trail and periodic backups, all kept in plain CSV files."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management commands
    #[command(subcommand)]
    Account(ledger::cli::AccountCommands),

    #[command(flatten)]
    Transaction(ledger::cli::TransactionCommands),

    /// Loan commands
    #[command(subcommand)]
    Loan(ledger::cli::LoanCommands),

    /// Backup commands
    #[command(subcommand)]
    Backup(ledger::cli::BackupCommands),

    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Check stored balances against a replay of the ledger
    Verify,

    /// Initialize the data directory
    Init,

    /// Show current configuration and paths
    Config,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = LedgerPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    let command = match cli.command {
        Some(Commands::Init) => {
            println!("Initializing ledger at: {}", paths.base_dir().display());
            paths.ensure_directories()?;
            settings.save(&paths)?;
            println!("Initialization complete!");
            println!();
            println!("Run 'ledger account open --help' to open the first account.");
            return Ok(());
        }
        Some(Commands::Config) => {
            println!("Ledger Configuration");
            println!("====================");
            println!("Data directory:   {}", paths.data_dir().display());
            println!("Backup directory: {}", paths.backup_dir().display());
            println!("Audit log:        {}", paths.audit_log().display());
            println!();
            println!("Settings:");
            println!("  Backup interval:    {} minutes", settings.backup_interval_minutes);
            println!(
                "  Backup sets kept:   {}",
                if settings.max_backup_sets == 0 {
                    "all".to_string()
                } else {
                    settings.max_backup_sets.to_string()
                }
            );
            println!("  Currency symbol:    {}", settings.currency_symbol);
            return Ok(());
        }
        Some(command) => command,
        None => {
            println!("Ledger - single-node account ledger");
            println!();
            println!("Run 'ledger --help' for usage information.");
            return Ok(());
        }
    };

    let audit = Arc::new(AuditLogger::open(paths.audit_log())?);
    let ledger = Ledger::open(paths, settings, audit)?;

    let result = match command {
        Commands::Account(cmd) => handle_account_command(&ledger, cmd).map(|_| true),
        Commands::Transaction(cmd) => handle_transaction_command(&ledger, cmd).map(|_| true),
        Commands::Loan(cmd) => handle_loan_command(&ledger, cmd).map(|_| true),
        Commands::Backup(cmd) => handle_backup_command(&ledger, cmd).await.map(|_| true),
        Commands::Audit { limit } => handle_audit_command(&ledger, limit).map(|_| true),
        Commands::Verify => handle_verify_command(&ledger),
        Commands::Init | Commands::Config => Ok(true),
    };

    ledger.shutdown();

    if !result? {
        bail!("ledger verification found inconsistencies");
    }

    Ok(())
}
