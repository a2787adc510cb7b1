//! Ledger service
//!
//! The single entry point for every operation on the books. All state sits
//! behind one mutex; each operation validates against in-memory state, then
//! commits in a fixed order:
//!
//! 1. loan operations persist the loans table (undone if step 2 fails);
//! 2. ledger entries are appended, which is the commit point;
//! 3. cached balances are updated and the accounts table is rewritten;
//! 4. the audit trail is written.
//!
//! A failure in step 3 is logged but not returned: the ledger already holds
//! the truth and balances are re-derived from it when the books are next
//! opened.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, NaiveDateTime};
use rust_decimal::Decimal;

use crate::audit::{AuditAction, AuditLogger};
use crate::config::{LedgerPaths, Settings};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Account, AccountNumber, AmortizationRow, Loan, Money, ProfileField, Transaction,
    TransactionType,
};
use crate::storage::{Books, LoanMismatch, ReplayMismatch};

/// Result of a transfer: the linked pair of ledger entries
#[derive(Debug, Clone)]
pub struct TransferResult {
    /// TRANSFER_OUT on the sender
    pub from_transaction: Transaction,
    /// TRANSFER_IN on the recipient
    pub to_transaction: Transaction,
}

/// Result of a loan payment
#[derive(Debug, Clone)]
pub struct LoanPaymentResult {
    /// Amount actually applied after clamping to the outstanding balance
    pub applied: Money,
    pub loan: Loan,
    pub transaction: Transaction,
}

/// Everything known about one account at a point in time
#[derive(Debug, Clone)]
pub struct Statement {
    pub account: Account,
    pub generated_at: NaiveDateTime,
    pub transactions: Vec<Transaction>,
    pub loans: Vec<Loan>,
    /// Sum of all credits to the account
    pub total_in: Money,
    /// Sum of all debits from the account
    pub total_out: Money,
}

/// Outcome of checking the books against the ledger
#[derive(Debug, Clone, Default)]
pub struct LedgerCheck {
    pub entries: usize,
    /// Entries whose `balance_after` disagrees with replay
    pub mismatches: Vec<ReplayMismatch>,
    /// Accounts whose cached balance disagrees with replay: (number, cached, derived)
    pub diverged: Vec<(AccountNumber, Money, Money)>,
    /// Accounts whose loans table disagrees with their loan entries
    pub loan_mismatches: Vec<LoanMismatch>,
}

impl LedgerCheck {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty() && self.diverged.is_empty() && self.loan_mismatches.is_empty()
    }

    /// Number of problems found
    pub fn problems(&self) -> usize {
        self.mismatches.len() + self.diverged.len() + self.loan_mismatches.len()
    }
}

/// The ledger engine
pub struct Ledger {
    paths: LedgerPaths,
    settings: Settings,
    books: Mutex<Books>,
    audit: Arc<AuditLogger>,
}

impl Ledger {
    /// Load the books and reconcile cached balances against the ledger
    pub fn open(paths: LedgerPaths, settings: Settings, audit: Arc<AuditLogger>) -> LedgerResult<Self> {
        settings.validate()?;

        let mut books = Books::new(&paths, &settings)?;
        books.load_all()?;

        match books.reconcile_balances() {
            Ok(0) => {}
            Ok(n) => audit.warning(
                AuditAction::Reconcile,
                None,
                format!("{} account balance(s) re-derived from ledger", n),
            ),
            Err(e) => tracing::warn!(error = %e, "failed to rewrite reconciled accounts table"),
        }

        for mismatch in books.transactions.verify_all() {
            tracing::warn!(
                account = %mismatch.account,
                position = mismatch.position,
                recorded = %mismatch.recorded,
                replayed = %mismatch.replayed,
                "ledger entry balance disagrees with replay"
            );
        }

        for mismatch in books.loan_mismatches() {
            tracing::warn!(
                account = %mismatch.account,
                kind = %mismatch.kind,
                loans = %mismatch.in_loans,
                ledger = %mismatch.in_ledger,
                "loans table disagrees with ledger"
            );
        }

        tracing::info!(
            accounts = books.accounts.len(),
            entries = books.transactions.len(),
            loans = books.loans.all().len(),
            "ledger opened"
        );

        Ok(Self {
            paths,
            settings,
            books: Mutex::new(books),
            audit,
        })
    }

    pub fn paths(&self) -> &LedgerPaths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    fn books(&self) -> LedgerResult<MutexGuard<'_, Books>> {
        self.books
            .lock()
            .map_err(|e| LedgerError::Persistence(format!("Ledger state lock poisoned: {}", e)))
    }

    /// Write the audit line for an operation's outcome
    fn audited<T>(
        &self,
        action: AuditAction,
        account: Option<AccountNumber>,
        result: LedgerResult<T>,
        details: impl FnOnce(&T) -> String,
    ) -> LedgerResult<T> {
        match &result {
            Ok(value) => self.audit.info(action, account, details(value)),
            Err(e) if e.is_persistence() => self.audit.error(action, account, e.to_string()),
            Err(e) => self.audit.warning(action, account, e.to_string()),
        }
        result
    }

    // ---------------------------------------------------------------------
    // Accounts
    // ---------------------------------------------------------------------

    /// Open a new account, optionally funded with an initial deposit
    pub fn register(
        &self,
        name: &str,
        email: &str,
        phone: &str,
        password: &str,
        initial_deposit: Money,
    ) -> LedgerResult<Account> {
        let result = self.register_inner(name, email, phone, password, initial_deposit);
        let number = result.as_ref().ok().map(|a| a.number);
        self.audited(AuditAction::CreateAccount, number, result, |account| {
            format!("name={} initial_deposit={}", account.name, account.balance)
        })
    }

    fn register_inner(
        &self,
        name: &str,
        email: &str,
        phone: &str,
        password: &str,
        initial_deposit: Money,
    ) -> LedgerResult<Account> {
        if initial_deposit.is_negative() {
            return Err(LedgerError::Validation(format!(
                "Initial deposit cannot be negative, got {}",
                initial_deposit
            )));
        }

        let mut books = self.books()?;
        let Books {
            accounts,
            transactions,
            ..
        } = &mut *books;

        let account = accounts.create(name, email, phone, password, |n| transactions.references(n))?;
        if initial_deposit.is_zero() {
            return Ok(account);
        }

        let entry = Transaction::new(
            account.number,
            TransactionType::Deposit,
            initial_deposit,
            initial_deposit,
            books.transactions.now(),
        );

        if let Err(e) = commit(&mut books, vec![entry], &[(account.number, initial_deposit)]) {
            if let Err(undo) = books.accounts.delete(account.number) {
                tracing::warn!(account = %account.number, error = %undo, "failed to undo registration");
            }
            return Err(e);
        }

        let account = books.accounts.get(account.number)?.clone();
        Ok(account)
    }

    /// Check credentials; frozen accounts may still sign in to query
    pub fn authenticate(&self, number: AccountNumber, password: &str) -> LedgerResult<Account> {
        let result = (|| -> LedgerResult<Account> {
            let books = self.books()?;
            if !books.accounts.verify_password(number, password)? {
                return Err(LedgerError::Permission("invalid credentials".into()));
            }
            let account = books.accounts.get(number)?.clone();
            Ok(account)
        })();

        self.audited(AuditAction::Login, Some(number), result, |_| "ok".into())
    }

    pub fn account(&self, number: AccountNumber) -> LedgerResult<Account> {
        self.books()?.accounts.get(number).cloned()
    }

    pub fn balance(&self, number: AccountNumber) -> LedgerResult<Money> {
        Ok(self.books()?.accounts.get(number)?.balance)
    }

    /// All open accounts in number order
    pub fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        Ok(self.books()?.accounts.list())
    }

    /// Sum of all open account balances
    pub fn total_holdings(&self) -> LedgerResult<Money> {
        Ok(self.books()?.accounts.total_holdings())
    }

    pub fn freeze(&self, number: AccountNumber) -> LedgerResult<Account> {
        let result = self.set_frozen(number, true);
        self.audited(AuditAction::Freeze, Some(number), result, |_| "frozen".into())
    }

    pub fn unfreeze(&self, number: AccountNumber) -> LedgerResult<Account> {
        let result = self.set_frozen(number, false);
        self.audited(AuditAction::Unfreeze, Some(number), result, |_| "active".into())
    }

    fn set_frozen(&self, number: AccountNumber, frozen: bool) -> LedgerResult<Account> {
        let mut books = self.books()?;
        let account = books.accounts.get(number)?;
        if account.is_frozen == frozen {
            return Err(LedgerError::Validation(format!(
                "Account {} is already {}",
                number,
                if frozen { "frozen" } else { "active" }
            )));
        }
        books.accounts.set_frozen(number, frozen)
    }

    /// Close an account for good
    ///
    /// The balance must be zero. Ledger history and loans stay, and the
    /// number is never issued again while history references it.
    pub fn close_account(&self, number: AccountNumber) -> LedgerResult<Account> {
        let result = (|| -> LedgerResult<Account> {
            let mut books = self.books()?;
            let account = books.accounts.get(number)?;
            if !account.balance.is_zero() {
                return Err(LedgerError::Validation(format!(
                    "Account {} still holds {}; withdraw it before closing",
                    number, account.balance
                )));
            }
            books.accounts.delete(number)
        })();

        self.audited(AuditAction::CloseAccount, Some(number), result, |a| {
            format!("name={}", a.name)
        })
    }

    pub fn update_profile(
        &self,
        number: AccountNumber,
        field: ProfileField,
        value: &str,
    ) -> LedgerResult<Account> {
        let result = self
            .books()
            .and_then(|mut books| books.accounts.update_profile(number, field, value));

        self.audited(AuditAction::UpdateProfile, Some(number), result, |_| {
            format!("field={}", field)
        })
    }

    /// Replace the password after checking the current one
    pub fn change_password(
        &self,
        number: AccountNumber,
        current: &str,
        new_password: &str,
    ) -> LedgerResult<()> {
        let result = (|| -> LedgerResult<()> {
            let mut books = self.books()?;
            if !books.accounts.verify_password(number, current)? {
                return Err(LedgerError::Permission("invalid credentials".into()));
            }
            books.accounts.set_password(number, new_password).map(|_| ())
        })();

        self.audited(AuditAction::ChangePassword, Some(number), result, |_| "ok".into())
    }

    // ---------------------------------------------------------------------
    // Money movement
    // ---------------------------------------------------------------------

    pub fn deposit(&self, number: AccountNumber, amount: Money) -> LedgerResult<Transaction> {
        let result = (|| -> LedgerResult<Transaction> {
            require_positive(amount)?;
            let mut books = self.books()?;
            let account = active_account(&books, number)?;

            let new_balance = account
                .balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::Validation("Deposit would overflow the balance".into()))?;

            let entry = Transaction::new(
                number,
                TransactionType::Deposit,
                amount,
                new_balance,
                books.transactions.now(),
            );
            let mut committed = commit(&mut books, vec![entry], &[(number, new_balance)])?;
            Ok(committed.remove(0))
        })();

        self.audited(AuditAction::Deposit, Some(number), result, |tx| {
            format!("amount={} balance={}", tx.amount, tx.balance_after)
        })
    }

    pub fn withdraw(&self, number: AccountNumber, amount: Money) -> LedgerResult<Transaction> {
        let result = (|| -> LedgerResult<Transaction> {
            require_positive(amount)?;
            let mut books = self.books()?;
            let account = active_account(&books, number)?;
            let new_balance = debit(&account, amount)?;

            let entry = Transaction::new(
                number,
                TransactionType::Withdraw,
                amount,
                new_balance,
                books.transactions.now(),
            );
            let mut committed = commit(&mut books, vec![entry], &[(number, new_balance)])?;
            Ok(committed.remove(0))
        })();

        self.audited(AuditAction::Withdraw, Some(number), result, |tx| {
            format!("amount={} balance={}", tx.amount, tx.balance_after)
        })
    }

    /// Move money between two accounts, all or nothing
    pub fn transfer(
        &self,
        from: AccountNumber,
        to: AccountNumber,
        amount: Money,
    ) -> LedgerResult<TransferResult> {
        let result = (|| -> LedgerResult<TransferResult> {
            require_positive(amount)?;
            if from == to {
                return Err(LedgerError::Validation(
                    "Cannot transfer to the same account".into(),
                ));
            }

            let mut books = self.books()?;
            let sender = active_account(&books, from)?;
            let recipient = active_account(&books, to)?;

            let sender_balance = debit(&sender, amount)?;
            let recipient_balance = recipient.balance.checked_add(amount).ok_or_else(|| {
                LedgerError::Validation("Transfer would overflow the recipient balance".into())
            })?;

            let now = books.transactions.now();
            let out = Transaction::new(from, TransactionType::TransferOut, amount, sender_balance, now);
            let inn = Transaction::new(to, TransactionType::TransferIn, amount, recipient_balance, now);

            let mut committed = commit(
                &mut books,
                vec![out, inn],
                &[(from, sender_balance), (to, recipient_balance)],
            )?;
            let to_transaction = committed.remove(1);
            let from_transaction = committed.remove(0);
            Ok(TransferResult {
                from_transaction,
                to_transaction,
            })
        })();

        self.audited(AuditAction::Transfer, Some(from), result, |r| {
            format!("to={} amount={}", to, r.from_transaction.amount)
        })
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Ledger history of an account, oldest first
    ///
    /// Works for closed accounts as long as the ledger still references them.
    pub fn history(&self, number: AccountNumber) -> LedgerResult<Vec<Transaction>> {
        let books = self.books()?;
        if !books.accounts.contains(number) && !books.transactions.references(number) {
            return Err(LedgerError::account_not_found(number));
        }
        Ok(books.transactions.history(number))
    }

    pub fn statement(&self, number: AccountNumber) -> LedgerResult<Statement> {
        let books = self.books()?;
        let account = books.accounts.get(number)?.clone();
        let transactions = books.transactions.history(number);

        let mut total_in = Money::zero();
        let mut total_out = Money::zero();
        for delta in transactions.iter().filter_map(Transaction::account_delta) {
            if delta.is_positive() {
                total_in += delta;
            } else {
                total_out += delta.abs();
            }
        }

        Ok(Statement {
            account,
            generated_at: Local::now().naive_local(),
            loans: books.loans.loans_for(number),
            transactions,
            total_in,
            total_out,
        })
    }

    /// Compare every cached balance and recorded `balance_after` with replay
    pub fn verify_ledger(&self) -> LedgerResult<LedgerCheck> {
        let books = self.books()?;

        let diverged = books
            .accounts
            .list()
            .into_iter()
            .filter_map(|account| {
                let derived = books.transactions.replay_balance(account.number);
                (derived != account.balance).then_some((account.number, account.balance, derived))
            })
            .collect();

        Ok(LedgerCheck {
            entries: books.transactions.len(),
            mismatches: books.transactions.verify_all(),
            diverged,
            loan_mismatches: books.loan_mismatches(),
        })
    }

    // ---------------------------------------------------------------------
    // Loans
    // ---------------------------------------------------------------------

    /// Disburse a loan into an account
    ///
    /// Returns the loan's 1-based index within the account and the loan.
    pub fn apply_loan(
        &self,
        number: AccountNumber,
        principal: Money,
        annual_rate_pct: Decimal,
        term_months: u32,
    ) -> LedgerResult<(usize, Loan)> {
        let result = (|| -> LedgerResult<(usize, Loan)> {
            require_positive(principal)?;
            let mut books = self.books()?;
            let account = active_account(&books, number)?;

            let new_balance = account.balance.checked_add(principal).ok_or_else(|| {
                LedgerError::Validation("Loan would overflow the account balance".into())
            })?;

            let snapshot = books.loans.snapshot();
            let (index, loan) = books.loans.apply(
                number,
                principal,
                annual_rate_pct,
                term_months,
                Local::now().date_naive(),
            )?;

            let entry = Transaction::new(
                number,
                TransactionType::LoanDisbursal,
                principal,
                new_balance,
                books.transactions.now(),
            );

            if let Err(e) = commit(&mut books, vec![entry], &[(number, new_balance)]) {
                undo_loans(&mut books, snapshot);
                return Err(e);
            }

            Ok((index, loan))
        })();

        self.audited(AuditAction::ApplyLoan, Some(number), result, |(index, loan)| {
            format!(
                "index={} principal={} rate={} term={} monthly={}",
                index, loan.principal, loan.interest_rate, loan.term_months, loan.monthly_payment
            )
        })
    }

    /// Pay down a loan; overpayment is clamped to what is owed
    ///
    /// Allowed for frozen and closed accounts: it moves the loan balance,
    /// not the account balance.
    pub fn pay_loan(
        &self,
        number: AccountNumber,
        index: usize,
        amount: Money,
    ) -> LedgerResult<LoanPaymentResult> {
        let result = (|| -> LedgerResult<LoanPaymentResult> {
            require_positive(amount)?;
            let mut books = self.books()?;

            let snapshot = books.loans.snapshot();
            let (applied, loan) = books.loans.pay(number, index, amount)?;

            let entry = Transaction::new(
                number,
                TransactionType::LoanPayment,
                applied,
                loan.balance,
                books.transactions.now(),
            );

            match commit(&mut books, vec![entry], &[]) {
                Ok(mut committed) => Ok(LoanPaymentResult {
                    applied,
                    loan,
                    transaction: committed.remove(0),
                }),
                Err(e) => {
                    undo_loans(&mut books, snapshot);
                    Err(e)
                }
            }
        })();

        self.audited(AuditAction::PayLoan, Some(number), result, |r| {
            format!("index={} applied={} remaining={}", index, r.applied, r.loan.balance)
        })
    }

    /// Loans of an account in creation order
    pub fn loans(&self, number: AccountNumber) -> LedgerResult<Vec<Loan>> {
        Ok(self.books()?.loans.loans_for(number))
    }

    pub fn loan_schedule(&self, number: AccountNumber, index: usize) -> LedgerResult<Vec<AmortizationRow>> {
        self.books()?.loans.schedule(number, index)
    }

    /// Flush and close the audit trail
    pub fn shutdown(&self) {
        self.audit.close();
        tracing::info!("ledger shut down");
    }
}

fn require_positive(amount: Money) -> LedgerResult<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::Validation(format!(
            "Amount must be positive, got {}",
            amount
        )))
    }
}

/// An existing account that accepts balance-affecting operations
fn active_account(books: &Books, number: AccountNumber) -> LedgerResult<Account> {
    let account = books.accounts.get(number)?;
    if account.is_frozen {
        return Err(LedgerError::frozen(number));
    }
    Ok(account.clone())
}

fn debit(account: &Account, amount: Money) -> LedgerResult<Money> {
    match account.balance.checked_sub(amount) {
        Some(balance) if !balance.is_negative() => Ok(balance),
        _ => Err(LedgerError::InsufficientFunds {
            account: account.number,
            needed: amount,
            available: account.balance,
        }),
    }
}

/// Append entries, then apply the new balances
///
/// Returns the entries as stored (timestamps may be clamped).
fn commit(
    books: &mut Books,
    entries: Vec<Transaction>,
    balances: &[(AccountNumber, Money)],
) -> LedgerResult<Vec<Transaction>> {
    let count = entries.len();
    books.transactions.append_all(entries)?;

    for &(number, balance) in balances {
        if let Err(e) = books.accounts.set_balance(number, balance) {
            tracing::warn!(account = %number, error = %e, "failed to apply committed balance");
        }
    }

    if !balances.is_empty() {
        if let Err(e) = books.accounts.save() {
            tracing::warn!(
                error = %e,
                "accounts table not rewritten; balances will be re-derived from the ledger on next open"
            );
        }
    }

    let stored = books.transactions.entries();
    Ok(stored[stored.len() - count..].to_vec())
}

fn undo_loans(books: &mut Books, snapshot: Vec<Loan>) {
    if let Err(e) = books.loans.restore(snapshot) {
        tracing::warn!(error = %e, "failed to restore loans table after aborted operation");
    }
}
