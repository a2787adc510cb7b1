//! Loan CLI commands

use clap::Subcommand;
use rust_decimal::Decimal;

use crate::display::loan::{format_loan_list, format_schedule};
use crate::error::LedgerResult;
use crate::models::{AccountNumber, Money};
use crate::services::Ledger;

use super::PasswordArg;

/// Loan subcommands
#[derive(Subcommand)]
pub enum LoanCommands {
    /// Take out a loan; the principal is paid into the account
    Apply {
        /// Account number
        number: AccountNumber,
        /// Principal (e.g., "10000.00")
        principal: Money,
        /// Annual interest rate in percent (e.g., "7.5")
        #[arg(short, long)]
        rate: Decimal,
        /// Term in months
        #[arg(short, long)]
        term: u32,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Pay towards a loan; overpayment is capped at what is owed
    Pay {
        /// Account number
        number: AccountNumber,
        /// Loan number as shown by `loan list`
        index: usize,
        /// Amount to pay
        amount: Money,
    },
    /// List an account's loans
    List {
        /// Account number
        number: AccountNumber,
    },
    /// Show the amortization schedule of a loan
    Schedule {
        /// Account number
        number: AccountNumber,
        /// Loan number as shown by `loan list`
        index: usize,
    },
}

/// Handle a loan command
pub fn handle_loan_command(ledger: &Ledger, cmd: LoanCommands) -> LedgerResult<()> {
    let symbol = ledger.settings().currency_symbol.as_str();

    match cmd {
        LoanCommands::Apply {
            number,
            principal,
            rate,
            term,
            password,
        } => {
            password.authenticate(ledger, number)?;
            let (index, loan) = ledger.apply_loan(number, principal, rate, term)?;

            println!("Loan #{} approved for account {}", index, number);
            println!("  Principal:       {}", loan.principal.format_with_symbol(symbol));
            println!("  Rate:            {}%", loan.interest_rate.normalize());
            println!("  Term:            {} months", loan.term_months);
            println!(
                "  Monthly payment: {}",
                loan.monthly_payment.format_with_symbol(symbol)
            );
        }

        LoanCommands::Pay {
            number,
            index,
            amount,
        } => {
            let result = ledger.pay_loan(number, index, amount)?;
            println!(
                "Paid {} towards loan #{}",
                result.applied.format_with_symbol(symbol),
                index
            );
            if result.loan.is_repaid() {
                println!("  Loan fully repaid.");
            } else {
                println!(
                    "  Remaining: {}",
                    result.loan.balance.format_with_symbol(symbol)
                );
            }
        }

        LoanCommands::List { number } => {
            let loans = ledger.loans(number)?;
            print!("{}", format_loan_list(&loans, symbol));
        }

        LoanCommands::Schedule { number, index } => {
            let rows = ledger.loan_schedule(number, index)?;
            print!("{}", format_schedule(&rows, symbol));
        }
    }

    Ok(())
}
