//! Append-only transaction ledger
//!
//! Mirrors `transactions.csv` in memory with a per-account index. Entries
//! are only ever appended; an append is durable before it returns.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime, SubsecRound};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{AccountNumber, Money, Transaction, TransactionType};

use super::file_io::{append_csv, read_csv, truncate_torn_tail};

/// Column order of the transactions table
pub const TRANSACTIONS_HEADER: &[&str] = &["account", "datetime", "type", "amount", "balance"];

/// A ledger entry whose recorded balance disagrees with replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMismatch {
    pub account: AccountNumber,
    /// 1-based position within the account's history
    pub position: usize,
    pub recorded: Money,
    pub replayed: Money,
}

/// Repository for the transaction ledger
pub struct TransactionLedger {
    path: PathBuf,
    entries: Vec<Transaction>,
    /// Index: account -> positions in `entries`
    by_account: HashMap<AccountNumber, Vec<usize>>,
}

impl TransactionLedger {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: Vec::new(),
            by_account: HashMap::new(),
        }
    }

    /// Load the ledger from disk and rebuild the index
    ///
    /// A torn final record left by a crash mid-append is cut off the file
    /// before reading.
    pub fn load(&mut self) -> LedgerResult<()> {
        truncate_torn_tail(&self.path)?;
        let rows: Vec<Transaction> = read_csv(&self.path)?;

        for (idx, tx) in rows.iter().enumerate() {
            tx.validate().map_err(|e| {
                LedgerError::Persistence(format!("Invalid ledger entry {}: {}", idx + 1, e))
            })?;
        }

        self.entries.clear();
        self.by_account.clear();
        for tx in rows {
            self.index(tx);
        }

        tracing::debug!(entries = self.entries.len(), "ledger loaded");
        Ok(())
    }

    fn index(&mut self, tx: Transaction) {
        self.by_account
            .entry(tx.account)
            .or_default()
            .push(self.entries.len());
        self.entries.push(tx);
    }

    fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.entries.last().map(|tx| tx.timestamp)
    }

    /// Timestamp for a new entry
    ///
    /// Wall-clock time truncated to whole seconds, never earlier than the
    /// last recorded entry.
    pub fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local().trunc_subsecs(0);
        match self.last_timestamp() {
            Some(last) if last > now => last,
            _ => now,
        }
    }

    /// Append one entry durably
    pub fn append(&mut self, tx: Transaction) -> LedgerResult<()> {
        self.append_all(vec![tx])
    }

    /// Append several entries with a single write and sync
    ///
    /// Either every entry reaches disk or, on error, none is added to the
    /// in-memory ledger.
    pub fn append_all(&mut self, mut txs: Vec<Transaction>) -> LedgerResult<()> {
        let mut floor = self.last_timestamp();
        for tx in &mut txs {
            tx.validate()
                .map_err(|e| LedgerError::Validation(e.to_string()))?;
            tx.timestamp = tx.timestamp.trunc_subsecs(0);
            if let Some(last) = floor {
                if tx.timestamp < last {
                    tx.timestamp = last;
                }
            }
            floor = Some(tx.timestamp);
        }

        append_csv(&self.path, TRANSACTIONS_HEADER, &txs)?;

        for tx in txs {
            self.index(tx);
        }
        Ok(())
    }

    /// Every entry for an account, oldest first
    ///
    /// Ties on timestamp keep insertion order.
    pub fn history(&self, account: AccountNumber) -> Vec<Transaction> {
        let mut history: Vec<Transaction> = self
            .by_account
            .get(&account)
            .map(|positions| positions.iter().map(|&i| self.entries[i].clone()).collect())
            .unwrap_or_default();

        history.sort_by_key(|tx| tx.timestamp);
        history
    }

    /// Account balance implied by the ledger alone
    pub fn replay_balance(&self, account: AccountNumber) -> Money {
        self.history(account)
            .iter()
            .filter_map(Transaction::account_delta)
            .sum()
    }

    /// Check every recorded `balance_after` of an account against replay
    pub fn verify(&self, account: AccountNumber) -> Vec<ReplayMismatch> {
        let mut running = Money::zero();
        let mut mismatches = Vec::new();

        for (idx, tx) in self.history(account).iter().enumerate() {
            let Some(delta) = tx.account_delta() else {
                continue;
            };
            running += delta;
            if tx.balance_after != running {
                mismatches.push(ReplayMismatch {
                    account,
                    position: idx + 1,
                    recorded: tx.balance_after,
                    replayed: running,
                });
            }
        }

        mismatches
    }

    /// Verify every account that appears in the ledger
    pub fn verify_all(&self) -> Vec<ReplayMismatch> {
        self.accounts()
            .into_iter()
            .flat_map(|account| self.verify(account))
            .collect()
    }

    /// Loan money disbursed to and paid back from each account
    pub fn loan_totals(&self) -> BTreeMap<AccountNumber, (Money, Money)> {
        let mut totals: BTreeMap<AccountNumber, (Money, Money)> = BTreeMap::new();
        for tx in &self.entries {
            match tx.kind {
                TransactionType::LoanDisbursal => {
                    totals.entry(tx.account).or_default().0 += tx.amount;
                }
                TransactionType::LoanPayment => {
                    totals.entry(tx.account).or_default().1 += tx.amount;
                }
                _ => {}
            }
        }
        totals
    }

    /// Whether any entry references the account
    pub fn references(&self, account: AccountNumber) -> bool {
        self.by_account.contains_key(&account)
    }

    /// Every account number that appears in the ledger
    pub fn accounts(&self) -> BTreeSet<AccountNumber> {
        self.by_account.keys().copied().collect()
    }

    pub fn entries(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_ledger() -> (TempDir, TransactionLedger) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("transactions.csv");
        (temp_dir, TransactionLedger::new(path))
    }

    fn acct(n: u32) -> AccountNumber {
        AccountNumber::new(n).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn entry(n: u32, kind: TransactionType, amount: i64, balance: i64, ts: NaiveDateTime) -> Transaction {
        Transaction::new(
            acct(n),
            kind,
            Money::from_cents(amount),
            Money::from_cents(balance),
            ts,
        )
    }

    #[test]
    fn test_append_and_reload() {
        let (temp_dir, mut ledger) = create_test_ledger();

        ledger
            .append(entry(123456, TransactionType::Deposit, 50_000, 50_000, at(9, 0, 0)))
            .unwrap();
        ledger
            .append(entry(123456, TransactionType::Withdraw, 20_000, 30_000, at(9, 5, 0)))
            .unwrap();

        let contents = fs::read_to_string(temp_dir.path().join("transactions.csv")).unwrap();
        assert_eq!(
            contents,
            "account,datetime,type,amount,balance\n\
             123456,2024-03-01 09:00:00,DEPOSIT,500.00,500.00\n\
             123456,2024-03-01 09:05:00,WITHDRAW,200.00,300.00\n"
        );

        let mut reloaded = TransactionLedger::new(temp_dir.path().join("transactions.csv"));
        reloaded.load().unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.history(acct(123456)), ledger.history(acct(123456)));
    }

    #[test]
    fn test_history_filters_by_account() {
        let (_temp_dir, mut ledger) = create_test_ledger();

        ledger
            .append_all(vec![
                entry(111111, TransactionType::TransferOut, 100, 900, at(10, 0, 0)),
                entry(222222, TransactionType::TransferIn, 100, 100, at(10, 0, 0)),
            ])
            .unwrap();

        let history = ledger.history(acct(222222));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionType::TransferIn);
        assert!(ledger.history(acct(333333)).is_empty());
        assert!(ledger.references(acct(111111)));
        assert!(!ledger.references(acct(333333)));
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let (_temp_dir, mut ledger) = create_test_ledger();

        ledger
            .append(entry(123456, TransactionType::Deposit, 100, 100, at(12, 0, 0)))
            .unwrap();
        ledger
            .append(entry(123456, TransactionType::Deposit, 100, 200, at(11, 0, 0)))
            .unwrap();

        let history = ledger.history(acct(123456));
        assert_eq!(history[1].timestamp, at(12, 0, 0));
        assert_eq!(history[1].balance_after, Money::from_cents(200));
        assert!(ledger.now() >= at(12, 0, 0));
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let (_temp_dir, mut ledger) = create_test_ledger();

        let err = ledger
            .append(entry(123456, TransactionType::Deposit, 0, 0, at(9, 0, 0)))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_failed_append_leaves_memory_untouched() {
        let (temp_dir, mut ledger) = create_test_ledger();
        fs::create_dir(temp_dir.path().join("transactions.csv")).unwrap();

        let err = ledger
            .append(entry(123456, TransactionType::Deposit, 100, 100, at(9, 0, 0)))
            .unwrap_err();
        assert!(err.is_persistence());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_replay_and_verify() {
        let (_temp_dir, mut ledger) = create_test_ledger();

        ledger
            .append_all(vec![
                entry(123456, TransactionType::Deposit, 10_000, 10_000, at(9, 0, 0)),
                entry(123456, TransactionType::LoanDisbursal, 5_000, 15_000, at(9, 1, 0)),
                entry(123456, TransactionType::LoanPayment, 1_000, 4_000, at(9, 2, 0)),
                entry(123456, TransactionType::Withdraw, 2_500, 12_500, at(9, 3, 0)),
            ])
            .unwrap();

        assert_eq!(ledger.replay_balance(acct(123456)), Money::from_cents(12_500));
        assert!(ledger.verify_all().is_empty());
        assert_eq!(
            ledger.loan_totals()[&acct(123456)],
            (Money::from_cents(5_000), Money::from_cents(1_000))
        );

        ledger
            .append(entry(123456, TransactionType::Deposit, 500, 99_999, at(9, 4, 0)))
            .unwrap();
        let mismatches = ledger.verify(acct(123456));
        assert_eq!(
            mismatches,
            vec![ReplayMismatch {
                account: acct(123456),
                position: 5,
                recorded: Money::from_cents(99_999),
                replayed: Money::from_cents(13_000),
            }]
        );
    }

    #[test]
    fn test_torn_final_record_dropped_on_load() {
        let (temp_dir, mut ledger) = create_test_ledger();
        let path = temp_dir.path().join("transactions.csv");
        fs::write(
            &path,
            "account,datetime,type,amount,balance\n\
             123456,2024-03-01 09:00:00,DEPOSIT,500.00,500.00\n\
             123456,2024-03-01 09:05:00,WITHD",
        )
        .unwrap();

        ledger.load().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.replay_balance(acct(123456)), Money::from_cents(50_000));

        ledger
            .append(entry(123456, TransactionType::Deposit, 100, 50_100, at(9, 6, 0)))
            .unwrap();
        let mut reloaded = TransactionLedger::new(path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.len(), 2);
    }
}
