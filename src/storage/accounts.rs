//! Account store backed by the accounts table
//!
//! Owns the in-memory set of accounts keyed by account number. Every
//! mutation rewrites `accounts.csv` atomically; if the rewrite fails the
//! in-memory change is rolled back so memory never runs ahead of disk.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use rand::Rng;

use crate::crypto::{hash_password, verify_password};
use crate::error::{LedgerError, LedgerResult};
use crate::models::account::validate_profile;
use crate::models::{Account, AccountNumber, Money, ProfileField};

use super::file_io::{read_csv, write_csv_atomic};

/// Column order of the accounts table
pub const ACCOUNTS_HEADER: &[&str] = &[
    "number",
    "name",
    "email",
    "phone",
    "password_hash",
    "balance",
    "frozen",
];

const DEFAULT_NUMBER_ATTEMPTS: u32 = 64;

/// In-memory account set with rewrite-on-write persistence
pub struct AccountStore {
    path: PathBuf,
    accounts: BTreeMap<AccountNumber, Account>,
    number_range: RangeInclusive<u32>,
    number_attempts: u32,
}

impl AccountStore {
    /// Create an empty store persisting to `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            accounts: BTreeMap::new(),
            number_range: AccountNumber::RANGE,
            number_attempts: DEFAULT_NUMBER_ATTEMPTS,
        }
    }

    /// Random probes made before sweeping the range linearly
    pub fn with_number_attempts(mut self, attempts: u32) -> Self {
        self.number_attempts = attempts.max(1);
        self
    }

    /// Restrict number allocation to a sub-range of the six-digit space
    pub fn with_number_range(mut self, range: RangeInclusive<u32>) -> LedgerResult<Self> {
        AccountNumber::new(*range.start())
            .and_then(|_| AccountNumber::new(*range.end()))
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        self.number_range = range;
        Ok(self)
    }

    /// Load accounts from disk
    pub fn load(&mut self) -> LedgerResult<()> {
        let rows: Vec<Account> = read_csv(&self.path)?;

        let mut accounts = BTreeMap::new();
        for account in rows {
            account.validate().map_err(|e| {
                LedgerError::Persistence(format!("Invalid account {}: {}", account.number, e))
            })?;
            let number = account.number;
            if accounts.insert(number, account).is_some() {
                return Err(LedgerError::Persistence(format!(
                    "Duplicate account number in accounts table: {}",
                    number
                )));
            }
        }

        self.accounts = accounts;
        Ok(())
    }

    /// Rewrite the accounts table
    pub fn save(&self) -> LedgerResult<()> {
        let rows: Vec<&Account> = self.accounts.values().collect();
        write_csv_atomic(&self.path, ACCOUNTS_HEADER, &rows)
    }

    /// Register a new account with zero balance
    ///
    /// `is_retired` reports numbers that must not be issued even though no
    /// live account holds them (closed accounts with ledger history).
    pub fn create(
        &mut self,
        name: &str,
        email: &str,
        phone: &str,
        password: &str,
        is_retired: impl Fn(AccountNumber) -> bool,
    ) -> LedgerResult<Account> {
        let name = name.trim();
        let email = email.trim();
        let phone = phone.trim();
        for (field, value) in [
            (ProfileField::Name, name),
            (ProfileField::Email, email),
            (ProfileField::Phone, phone),
        ] {
            validate_profile(field, value).map_err(|e| LedgerError::Validation(e.to_string()))?;
        }

        let password_hash = hash_password(password)?;
        let number = self.allocate_number(&is_retired)?;

        let account = Account::new(number, name, email, phone, password_hash);
        self.accounts.insert(number, account.clone());

        if let Err(e) = self.save() {
            self.accounts.remove(&number);
            return Err(e);
        }

        Ok(account)
    }

    /// Pick an unused, unretired number
    ///
    /// Random probes first; if they all collide, sweep the whole range from
    /// a random starting point so the search always terminates.
    fn allocate_number(&self, is_retired: &impl Fn(AccountNumber) -> bool) -> LedgerResult<AccountNumber> {
        let start = *self.number_range.start();
        let end = *self.number_range.end();
        let available = |n: AccountNumber| !self.accounts.contains_key(&n) && !is_retired(n);

        let mut rng = rand::thread_rng();
        for _ in 0..self.number_attempts {
            let candidate = AccountNumber::new(rng.gen_range(start..=end))
                .map_err(|e| LedgerError::Config(e.to_string()))?;
            if available(candidate) {
                return Ok(candidate);
            }
        }

        let span = end - start + 1;
        let offset = rng.gen_range(0..span);
        for step in 0..span {
            let value = start + (offset + step) % span;
            let candidate =
                AccountNumber::new(value).map_err(|e| LedgerError::Config(e.to_string()))?;
            if available(candidate) {
                return Ok(candidate);
            }
        }

        Err(LedgerError::Validation(
            "No account numbers left to allocate".into(),
        ))
    }

    /// Get an account by number
    pub fn get(&self, number: AccountNumber) -> LedgerResult<&Account> {
        self.accounts
            .get(&number)
            .ok_or_else(|| LedgerError::account_not_found(number))
    }

    pub fn contains(&self, number: AccountNumber) -> bool {
        self.accounts.contains_key(&number)
    }

    /// All accounts in ascending number order
    pub fn list(&self) -> Vec<Account> {
        self.accounts.values().cloned().collect()
    }

    /// Sum of all account balances
    pub fn total_holdings(&self) -> Money {
        self.accounts.values().map(|a| a.balance).sum()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Apply `change` to one account and persist, undoing it if the write fails
    fn mutate_and_save(
        &mut self,
        number: AccountNumber,
        change: impl FnOnce(&mut Account) -> LedgerResult<()>,
    ) -> LedgerResult<Account> {
        let account = self
            .accounts
            .get_mut(&number)
            .ok_or_else(|| LedgerError::account_not_found(number))?;

        let before = account.clone();
        change(account)?;
        let after = account.clone();

        if let Err(e) = self.save() {
            self.accounts.insert(number, before);
            return Err(e);
        }

        Ok(after)
    }

    /// Freeze or unfreeze an account
    pub fn set_frozen(&mut self, number: AccountNumber, frozen: bool) -> LedgerResult<Account> {
        self.mutate_and_save(number, |account| {
            account.is_frozen = frozen;
            Ok(())
        })
    }

    /// Remove an account; ledger history is untouched
    pub fn delete(&mut self, number: AccountNumber) -> LedgerResult<Account> {
        let removed = self
            .accounts
            .remove(&number)
            .ok_or_else(|| LedgerError::account_not_found(number))?;

        if let Err(e) = self.save() {
            self.accounts.insert(number, removed);
            return Err(e);
        }

        Ok(removed)
    }

    /// Change one profile field
    pub fn update_profile(
        &mut self,
        number: AccountNumber,
        field: ProfileField,
        value: &str,
    ) -> LedgerResult<Account> {
        let value = value.trim();
        validate_profile(field, value).map_err(|e| LedgerError::Validation(e.to_string()))?;

        self.mutate_and_save(number, |account| {
            account.set_profile(field, value);
            Ok(())
        })
    }

    /// Replace the stored password hash
    pub fn set_password(&mut self, number: AccountNumber, new_password: &str) -> LedgerResult<Account> {
        self.get(number)?;
        let hash = hash_password(new_password)?;

        self.mutate_and_save(number, |account| {
            account.password_hash = hash;
            Ok(())
        })
    }

    /// Check a password against the stored hash
    pub fn verify_password(&self, number: AccountNumber, password: &str) -> LedgerResult<bool> {
        let account = self.get(number)?;
        Ok(verify_password(password, &account.password_hash))
    }

    /// Set a cached balance in memory without persisting
    ///
    /// Used by the facade after the ledger append has committed; the caller
    /// saves once all balances of the operation are applied.
    pub(crate) fn set_balance(&mut self, number: AccountNumber, balance: Money) -> LedgerResult<()> {
        if balance.is_negative() {
            return Err(LedgerError::Validation(format!(
                "Balance of account {} cannot become negative",
                number
            )));
        }

        let account = self
            .accounts
            .get_mut(&number)
            .ok_or_else(|| LedgerError::account_not_found(number))?;
        account.balance = balance;
        Ok(())
    }

    /// Overwrite cached balances with ledger-derived ones
    ///
    /// Returns `(number, cached, derived)` for every account that diverged.
    pub(crate) fn reconcile(
        &mut self,
        derived: impl Fn(AccountNumber) -> Money,
    ) -> Vec<(AccountNumber, Money, Money)> {
        let mut changed = Vec::new();
        for account in self.accounts.values_mut() {
            let expected = derived(account.number);
            if account.balance != expected {
                changed.push((account.number, account.balance, expected));
                account.balance = expected;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, AccountStore) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("accounts.csv");
        (temp_dir, AccountStore::new(path))
    }

    fn never_retired(_: AccountNumber) -> bool {
        false
    }

    #[test]
    fn test_empty_load() {
        let (_temp_dir, mut store) = create_test_store();
        store.load().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_and_get() {
        let (_temp_dir, mut store) = create_test_store();

        let account = store
            .create("Asha", "asha@example.com", "98765", "secret1", never_retired)
            .unwrap();

        assert!(AccountNumber::RANGE.contains(&account.number.value()));
        assert_eq!(account.balance, Money::zero());
        assert!(!account.is_frozen);

        let fetched = store.get(account.number).unwrap();
        assert_eq!(fetched.name, "Asha");
        assert_ne!(fetched.password_hash, "secret1");
    }

    #[test]
    fn test_create_validates_profile() {
        let (_temp_dir, mut store) = create_test_store();
        let err = store
            .create("   ", "a@b.c", "1", "secret1", never_retired)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let (temp_dir, mut store) = create_test_store();

        let account = store
            .create("Ravi", "ravi@example.com", "12345", "secret1", never_retired)
            .unwrap();
        store.set_frozen(account.number, true).unwrap();

        let mut reloaded = AccountStore::new(temp_dir.path().join("accounts.csv"));
        reloaded.load().unwrap();

        let fetched = reloaded.get(account.number).unwrap();
        assert_eq!(fetched.name, "Ravi");
        assert!(fetched.is_frozen);
        assert!(reloaded.verify_password(account.number, "secret1").unwrap());
    }

    #[test]
    fn test_numbers_are_unique_and_retired_numbers_skipped() {
        let (_temp_dir, store) = create_test_store();
        let mut store = store.with_number_range(100_000..=100_002).unwrap();

        let retired = AccountNumber::new(100_001).unwrap();
        let a = store.create("A", "", "", "secret1", |n| n == retired).unwrap();
        let b = store.create("B", "", "", "secret1", |n| n == retired).unwrap();

        assert_ne!(a.number, b.number);
        assert_ne!(a.number, retired);
        assert_ne!(b.number, retired);
    }

    #[test]
    fn test_exhausted_number_space_is_validation_error() {
        let (_temp_dir, store) = create_test_store();
        let mut store = store
            .with_number_range(100_000..=100_001)
            .unwrap()
            .with_number_attempts(3);

        store.create("A", "", "", "secret1", never_retired).unwrap();
        store.create("B", "", "", "secret1", never_retired).unwrap();

        let err = store
            .create("C", "", "", "secret1", never_retired)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_delete() {
        let (_temp_dir, mut store) = create_test_store();
        let account = store.create("Test", "", "", "secret1", never_retired).unwrap();

        store.delete(account.number).unwrap();
        assert!(!store.contains(account.number));

        let err = store.delete(account.number).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_profile_and_password() {
        let (_temp_dir, mut store) = create_test_store();
        let account = store.create("Test", "", "", "secret1", never_retired).unwrap();

        store
            .update_profile(account.number, ProfileField::Email, "new@example.com")
            .unwrap();
        assert_eq!(store.get(account.number).unwrap().email, "new@example.com");

        let err = store
            .update_profile(account.number, ProfileField::Email, "broken")
            .unwrap_err();
        assert!(err.is_validation());

        store.set_password(account.number, "rotated").unwrap();
        assert!(store.verify_password(account.number, "rotated").unwrap());
        assert!(!store.verify_password(account.number, "secret1").unwrap());
    }

    #[test]
    fn test_failed_save_rolls_back() {
        let (temp_dir, mut store) = create_test_store();
        let account = store.create("Test", "", "", "secret1", never_retired).unwrap();

        let path = temp_dir.path().join("accounts.csv");
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = store.set_frozen(account.number, true).unwrap_err();
        assert!(err.is_persistence());
        assert!(!store.get(account.number).unwrap().is_frozen);

        let err = store.delete(account.number).unwrap_err();
        assert!(err.is_persistence());
        assert!(store.contains(account.number));
    }

    #[test]
    fn test_total_holdings_and_reconcile() {
        let (_temp_dir, mut store) = create_test_store();
        let a = store.create("A", "", "", "secret1", never_retired).unwrap();
        let b = store.create("B", "", "", "secret1", never_retired).unwrap();

        store.set_balance(a.number, Money::from_cents(1_000)).unwrap();
        store.set_balance(b.number, Money::from_cents(2_500)).unwrap();
        assert_eq!(store.total_holdings(), Money::from_cents(3_500));

        assert!(store.set_balance(a.number, Money::from_cents(-1)).is_err());

        let changed = store.reconcile(|n| {
            if n == a.number {
                Money::from_cents(700)
            } else {
                Money::from_cents(2_500)
            }
        });
        assert_eq!(changed, vec![(a.number, Money::from_cents(1_000), Money::from_cents(700))]);
        assert_eq!(store.get(a.number).unwrap().balance, Money::from_cents(700));
    }

    #[test]
    fn test_duplicate_rows_rejected_on_load() {
        let (temp_dir, mut store) = create_test_store();
        let path = temp_dir.path().join("accounts.csv");
        fs::write(
            &path,
            "number,name,email,phone,password_hash,balance,frozen\n\
             123456,A,,,h,0.00,false\n\
             123456,B,,,h,0.00,false\n",
        )
        .unwrap();

        let err = store.load().unwrap_err();
        assert!(err.is_persistence());
    }
}
