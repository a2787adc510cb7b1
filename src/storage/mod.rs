//! Storage layer for the ledger
//!
//! Three CSV tables: accounts and loans are rewritten atomically on every
//! change, transactions are appended durably.

pub mod accounts;
pub mod file_io;
pub mod loans;
pub mod transactions;

pub use accounts::AccountStore;
pub use file_io::{append_csv, read_csv, write_csv_atomic};
pub use loans::LoanBook;
pub use transactions::{ReplayMismatch, TransactionLedger};

use crate::config::{LedgerPaths, Settings};
use crate::error::LedgerResult;
use crate::models::{AccountNumber, Money, TransactionType};

/// An account whose loans table disagrees with its loan entries in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanMismatch {
    pub account: AccountNumber,
    /// `LoanDisbursal` compares principal lent, `LoanPayment` compares principal repaid
    pub kind: TransactionType,
    pub in_loans: Money,
    pub in_ledger: Money,
}

/// The three tables the engine keeps consistent
pub struct Books {
    pub accounts: AccountStore,
    pub transactions: TransactionLedger,
    pub loans: LoanBook,
}

impl Books {
    /// Create empty books over the tables under `paths`
    pub fn new(paths: &LedgerPaths, settings: &Settings) -> LedgerResult<Self> {
        paths.ensure_directories()?;

        Ok(Self {
            accounts: AccountStore::new(paths.accounts_file())
                .with_number_attempts(settings.account_number_attempts),
            transactions: TransactionLedger::new(paths.transactions_file()),
            loans: LoanBook::new(paths.loans_file()),
        })
    }

    /// Load all tables from disk
    pub fn load_all(&mut self) -> LedgerResult<()> {
        self.accounts.load()?;
        self.transactions.load()?;
        self.loans.load()?;
        Ok(())
    }

    /// Re-derive cached account balances from the ledger
    ///
    /// Returns how many accounts were corrected. The accounts table is
    /// rewritten only when something changed.
    pub fn reconcile_balances(&mut self) -> LedgerResult<usize> {
        let ledger = &self.transactions;
        let changed = self
            .accounts
            .reconcile(|number| ledger.replay_balance(number));

        for (number, cached, derived) in &changed {
            tracing::warn!(
                account = %number,
                cached = %cached,
                derived = %derived,
                "account balance diverged from ledger; using ledger"
            );
        }

        if !changed.is_empty() {
            self.accounts.save()?;
        }
        Ok(changed.len())
    }

    /// Cross-check the loans table against loan entries in the ledger
    ///
    /// Per account, the principal of every loan must equal the sum of its
    /// LOAN_DISBURSAL entries, and the principal repaid must equal the sum
    /// of its LOAN_PAYMENT entries.
    pub fn loan_mismatches(&self) -> Vec<LoanMismatch> {
        let in_loans = self.loans.totals();
        let in_ledger = self.transactions.loan_totals();

        let mut accounts: Vec<AccountNumber> =
            in_loans.keys().chain(in_ledger.keys()).copied().collect();
        accounts.sort();
        accounts.dedup();

        let mut mismatches = Vec::new();
        for account in accounts {
            let (lent, repaid) = in_loans.get(&account).copied().unwrap_or_default();
            let (disbursed, paid) = in_ledger.get(&account).copied().unwrap_or_default();

            for (kind, in_loans, in_ledger) in [
                (TransactionType::LoanDisbursal, lent, disbursed),
                (TransactionType::LoanPayment, repaid, paid),
            ] {
                if in_loans != in_ledger {
                    mismatches.push(LoanMismatch {
                        account,
                        kind,
                        in_loans,
                        in_ledger,
                    });
                }
            }
        }
        mismatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    #[test]
    fn test_books_creation() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let mut books = Books::new(&paths, &Settings::default()).unwrap();

        assert!(temp_dir.path().join("data").exists());
        assert!(temp_dir.path().join("backups").exists());
        books.load_all().unwrap();
        assert!(books.accounts.is_empty());
    }

    #[test]
    fn test_reconcile_uses_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let mut books = Books::new(&paths, &Settings::default()).unwrap();

        let account = books
            .accounts
            .create("Asha", "", "", "secret1", |_| false)
            .unwrap();
        let ts = books.transactions.now();
        books
            .transactions
            .append(Transaction::new(
                account.number,
                TransactionType::Deposit,
                Money::from_cents(7_500),
                Money::from_cents(7_500),
                ts,
            ))
            .unwrap();

        assert_eq!(books.reconcile_balances().unwrap(), 1);
        assert_eq!(books.reconcile_balances().unwrap(), 0);

        let mut reopened = Books::new(&paths, &Settings::default()).unwrap();
        reopened.load_all().unwrap();
        assert_eq!(
            reopened.accounts.get(account.number).unwrap().balance,
            Money::from_cents(7_500)
        );
    }

    #[test]
    fn test_loan_table_checked_against_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let mut books = Books::new(&paths, &Settings::default()).unwrap();
        let account = books
            .accounts
            .create("Asha", "", "", "secret1", |_| false)
            .unwrap();

        let ts = books.transactions.now();
        let (index, loan) = books
            .loans
            .apply(account.number, Money::from_cents(500_000), dec!(0), 10, ts.date())
            .unwrap();
        books
            .transactions
            .append(Transaction::new(
                account.number,
                TransactionType::LoanDisbursal,
                loan.principal,
                loan.principal,
                ts,
            ))
            .unwrap();
        assert!(books.loan_mismatches().is_empty());

        // Repaid in the loans table with no matching ledger entry
        books
            .loans
            .pay(account.number, index, Money::from_cents(50_000))
            .unwrap();
        assert_eq!(
            books.loan_mismatches(),
            vec![LoanMismatch {
                account: account.number,
                kind: TransactionType::LoanPayment,
                in_loans: Money::from_cents(50_000),
                in_ledger: Money::zero(),
            }]
        );
    }
}
