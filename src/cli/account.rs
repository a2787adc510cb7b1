//! Account CLI commands
//!
//! Implements CLI commands for account management.

use clap::Subcommand;

use crate::display::account::{format_account_details, format_account_list};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{AccountNumber, Money, ProfileField};
use crate::services::Ledger;

use super::{prompt_new_password, PasswordArg};

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Open {
        /// Account holder's name
        name: String,
        /// Email address
        #[arg(short, long)]
        email: String,
        /// Phone number (digits only)
        #[arg(short, long)]
        phone: String,
        /// Initial deposit (e.g., "500.00" or "500")
        #[arg(short, long, default_value = "0")]
        deposit: Money,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Show account details
    Show {
        /// Account number
        number: AccountNumber,
    },
    /// List all open accounts
    List,
    /// Freeze an account
    Freeze {
        /// Account number
        number: AccountNumber,
    },
    /// Unfreeze an account
    Unfreeze {
        /// Account number
        number: AccountNumber,
    },
    /// Close an account (balance must be zero)
    Close {
        /// Account number
        number: AccountNumber,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Update a profile field
    Update {
        /// Account number
        number: AccountNumber,
        /// Field to change (name, email, phone)
        field: String,
        /// New value
        value: String,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Change the account password
    Passwd {
        /// Account number
        number: AccountNumber,
        #[command(flatten)]
        password: PasswordArg,
        /// New password (prompted for when omitted)
        #[arg(long, env = "LEDGER_NEW_PASSWORD", hide_env_values = true)]
        new_password: Option<String>,
    },
}

/// Handle an account command
pub fn handle_account_command(ledger: &Ledger, cmd: AccountCommands) -> LedgerResult<()> {
    let symbol = ledger.settings().currency_symbol.as_str();

    match cmd {
        AccountCommands::Open {
            name,
            email,
            phone,
            deposit,
            password,
        } => {
            let password = prompt_new_password(password.password)?;
            let account = ledger.register(&name, &email, &phone, &password, deposit)?;

            println!("Opened account: {}", account.number);
            println!("  Holder:  {}", account.name);
            println!("  Balance: {}", account.balance.format_with_symbol(symbol));
        }

        AccountCommands::Show { number } => {
            let account = ledger.account(number)?;
            let loans = ledger.loans(number)?;
            print!("{}", format_account_details(&account, &loans, symbol));
        }

        AccountCommands::List => {
            let accounts = ledger.list_accounts()?;
            print!("{}", format_account_list(&accounts, symbol));
        }

        AccountCommands::Freeze { number } => {
            ledger.freeze(number)?;
            println!("Froze account: {}", number);
        }

        AccountCommands::Unfreeze { number } => {
            ledger.unfreeze(number)?;
            println!("Unfroze account: {}", number);
        }

        AccountCommands::Close { number, password } => {
            password.authenticate(ledger, number)?;
            let closed = ledger.close_account(number)?;
            println!("Closed account: {} ({})", closed.number, closed.name);
        }

        AccountCommands::Update {
            number,
            field,
            value,
            password,
        } => {
            let field = ProfileField::parse(&field).ok_or_else(|| {
                LedgerError::Validation(format!(
                    "Invalid field: '{}'. Valid fields: name, email, phone",
                    field
                ))
            })?;

            password.authenticate(ledger, number)?;
            ledger.update_profile(number, field, &value)?;
            println!("Updated {} for account {}", field, number);
        }

        AccountCommands::Passwd {
            number,
            password,
            new_password,
        } => {
            let current = password.resolve("Current password: ")?;
            let new_password = prompt_new_password(new_password)?;
            ledger.change_password(number, &current, &new_password)?;
            println!("Password changed for account {}", number);
        }
    }

    Ok(())
}
