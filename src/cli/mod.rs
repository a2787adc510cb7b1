//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the ledger facade.

pub mod account;
pub mod audit;
pub mod backup;
pub mod loan;
pub mod transaction;

use clap::Args;

use crate::error::{LedgerError, LedgerResult};
use crate::models::AccountNumber;
use crate::services::Ledger;

pub use account::{handle_account_command, AccountCommands};
pub use audit::{handle_audit_command, handle_verify_command};
pub use backup::{handle_backup_command, BackupCommands};
pub use loan::{handle_loan_command, LoanCommands};
pub use transaction::{handle_transaction_command, TransactionCommands};

/// Account password, taken from the flag, the environment or a prompt
#[derive(Args, Debug, Clone, Default)]
pub struct PasswordArg {
    /// Account password (prompted for when omitted)
    #[arg(long, env = "LEDGER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl PasswordArg {
    /// The supplied password, or one read from the terminal
    pub fn resolve(self, prompt: &str) -> LedgerResult<String> {
        match self.password {
            Some(password) => Ok(password),
            None => prompt_password(prompt),
        }
    }

    /// Resolve and check the password against an account
    pub fn authenticate(self, ledger: &Ledger, number: AccountNumber) -> LedgerResult<()> {
        let password = self.resolve(&format!("Password for {}: ", number))?;
        ledger.authenticate(number, &password).map(|_| ())
    }
}

/// Read a password without echo
pub fn prompt_password(prompt: &str) -> LedgerResult<String> {
    rpassword::prompt_password(prompt)
        .map_err(|e| LedgerError::Validation(format!("Failed to read password: {}", e)))
}

/// Read a new password, asking twice when prompting
pub fn prompt_new_password(supplied: Option<String>) -> LedgerResult<String> {
    if let Some(password) = supplied {
        return Ok(password);
    }

    let first = prompt_password("New password: ")?;
    let second = prompt_password("Confirm password: ")?;
    if first != second {
        return Err(LedgerError::Validation("Passwords do not match".into()));
    }
    Ok(first)
}
