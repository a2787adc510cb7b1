//! Money movement CLI commands
//!
//! Deposits, withdrawals and transfers, plus the read-only history and
//! statement views.

use clap::Subcommand;

use crate::display::transaction::{format_statement, format_transaction_register};
use crate::error::LedgerResult;
use crate::models::{AccountNumber, Money};
use crate::services::Ledger;

use super::PasswordArg;

/// Transaction commands
#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Deposit money into an account
    Deposit {
        /// Account number
        number: AccountNumber,
        /// Amount (e.g., "50.00" or "50")
        amount: Money,
    },
    /// Withdraw money from an account
    Withdraw {
        /// Account number
        number: AccountNumber,
        /// Amount (e.g., "50.00" or "50")
        amount: Money,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Transfer money between accounts
    Transfer {
        /// Source account number
        from: AccountNumber,
        /// Destination account number
        to: AccountNumber,
        /// Amount (e.g., "50.00" or "50")
        amount: Money,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Show an account's ledger history
    History {
        /// Account number
        number: AccountNumber,
        /// Only show the most recent entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print an account statement
    Statement {
        /// Account number
        number: AccountNumber,
    },
}

/// Handle a transaction command
pub fn handle_transaction_command(ledger: &Ledger, cmd: TransactionCommands) -> LedgerResult<()> {
    let symbol = ledger.settings().currency_symbol.as_str();

    match cmd {
        TransactionCommands::Deposit { number, amount } => {
            let txn = ledger.deposit(number, amount)?;
            println!(
                "Deposited {} into {}. New balance: {}",
                txn.amount.format_with_symbol(symbol),
                number,
                txn.balance_after.format_with_symbol(symbol)
            );
        }

        TransactionCommands::Withdraw {
            number,
            amount,
            password,
        } => {
            password.authenticate(ledger, number)?;
            let txn = ledger.withdraw(number, amount)?;
            println!(
                "Withdrew {} from {}. New balance: {}",
                txn.amount.format_with_symbol(symbol),
                number,
                txn.balance_after.format_with_symbol(symbol)
            );
        }

        TransactionCommands::Transfer {
            from,
            to,
            amount,
            password,
        } => {
            password.authenticate(ledger, from)?;
            let result = ledger.transfer(from, to, amount)?;
            println!(
                "Transferred {} from {} to {}",
                amount.format_with_symbol(symbol),
                from,
                to
            );
            println!(
                "  {} balance: {}",
                from,
                result.from_transaction.balance_after.format_with_symbol(symbol)
            );
        }

        TransactionCommands::History { number, limit } => {
            let mut history = ledger.history(number)?;
            if let Some(limit) = limit {
                let start = history.len().saturating_sub(limit);
                history = history.split_off(start);
            }
            print!("{}", format_transaction_register(&history, symbol));
        }

        TransactionCommands::Statement { number } => {
            let statement = ledger.statement(number)?;
            print!("{}", format_statement(&statement, symbol));
        }
    }

    Ok(())
}
