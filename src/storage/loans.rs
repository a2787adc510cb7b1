//! Loan book backed by the loans table
//!
//! Loans are kept in creation order. A loan is addressed by its owning
//! account and its 1-based position among that account's loans.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{AccountNumber, AmortizationRow, Loan, Money};

use super::file_io::{read_csv, write_csv_atomic};

/// Column order of the loans table
pub const LOANS_HEADER: &[&str] = &[
    "account",
    "principal",
    "interest_rate",
    "term_months",
    "start_date",
    "balance",
];

/// Repository for loans
pub struct LoanBook {
    path: PathBuf,
    loans: Vec<Loan>,
}

impl LoanBook {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            loans: Vec::new(),
        }
    }

    /// Load loans from disk, re-deriving each monthly payment
    pub fn load(&mut self) -> LedgerResult<()> {
        let rows: Vec<Loan> = read_csv(&self.path)?;

        let mut loans = Vec::with_capacity(rows.len());
        for (idx, loan) in rows.into_iter().enumerate() {
            let loan = loan.with_derived().map_err(|e| {
                LedgerError::Persistence(format!("Invalid loan record {}: {}", idx + 1, e))
            })?;
            loans.push(loan);
        }

        self.loans = loans;
        Ok(())
    }

    /// Rewrite the loans table
    pub fn save(&self) -> LedgerResult<()> {
        write_csv_atomic(&self.path, LOANS_HEADER, &self.loans)
    }

    fn position(&self, account: AccountNumber, index: usize) -> LedgerResult<usize> {
        if index == 0 {
            return Err(LedgerError::loan_not_found(format!("{}#{}", account, index)));
        }

        self.loans
            .iter()
            .enumerate()
            .filter(|(_, loan)| loan.account == account)
            .nth(index - 1)
            .map(|(pos, _)| pos)
            .ok_or_else(|| LedgerError::loan_not_found(format!("{}#{}", account, index)))
    }

    /// Get a loan by account and 1-based index
    pub fn get(&self, account: AccountNumber, index: usize) -> LedgerResult<&Loan> {
        let pos = self.position(account, index)?;
        Ok(&self.loans[pos])
    }

    /// Loans of one account in creation order
    pub fn loans_for(&self, account: AccountNumber) -> Vec<Loan> {
        self.loans
            .iter()
            .filter(|loan| loan.account == account)
            .cloned()
            .collect()
    }

    /// Principal lent and amount repaid so far, per account
    pub fn totals(&self) -> BTreeMap<AccountNumber, (Money, Money)> {
        let mut totals: BTreeMap<AccountNumber, (Money, Money)> = BTreeMap::new();
        for loan in &self.loans {
            let (lent, repaid) = totals.entry(loan.account).or_default();
            *lent += loan.principal;
            *repaid += loan.principal - loan.balance;
        }
        totals
    }

    pub fn all(&self) -> &[Loan] {
        &self.loans
    }

    /// Copy of the current loans for a later [`LoanBook::restore`]
    pub(crate) fn snapshot(&self) -> Vec<Loan> {
        self.loans.clone()
    }

    /// Put back a snapshot and persist it
    pub(crate) fn restore(&mut self, loans: Vec<Loan>) -> LedgerResult<()> {
        self.loans = loans;
        self.save()
    }

    /// Record a new loan with its full principal outstanding
    ///
    /// Returns the loan and its 1-based index within the account.
    pub fn apply(
        &mut self,
        account: AccountNumber,
        principal: Money,
        annual_rate_pct: Decimal,
        term_months: u32,
        start_date: NaiveDate,
    ) -> LedgerResult<(usize, Loan)> {
        let loan = Loan::new(account, principal, annual_rate_pct, term_months, start_date)
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        self.loans.push(loan.clone());
        if let Err(e) = self.save() {
            self.loans.pop();
            return Err(e);
        }

        let index = self.loans.iter().filter(|l| l.account == account).count();
        Ok((index, loan))
    }

    /// Reduce a loan balance by `amount`, clamped to what is owed
    ///
    /// Returns the amount actually applied and the updated loan.
    pub fn pay(
        &mut self,
        account: AccountNumber,
        index: usize,
        amount: Money,
    ) -> LedgerResult<(Money, Loan)> {
        if !amount.is_positive() {
            return Err(LedgerError::Validation(format!(
                "Payment amount must be positive, got {}",
                amount
            )));
        }

        let pos = self.position(account, index)?;
        let before = self.loans[pos].clone();
        if before.is_repaid() {
            return Err(LedgerError::Validation(format!(
                "Loan {}#{} is already repaid",
                account, index
            )));
        }

        let applied = before.clamp_payment(amount);
        self.loans[pos].balance -= applied;
        let after = self.loans[pos].clone();

        if let Err(e) = self.save() {
            self.loans[pos] = before;
            return Err(e);
        }

        Ok((applied, after))
    }

    /// Amortization table of a loan
    pub fn schedule(&self, account: AccountNumber, index: usize) -> LedgerResult<Vec<AmortizationRow>> {
        Ok(self.get(account, index)?.schedule())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_book() -> (TempDir, LoanBook) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("loans.csv");
        (temp_dir, LoanBook::new(path))
    }

    fn acct(n: u32) -> AccountNumber {
        AccountNumber::new(n).unwrap()
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_apply_and_reload() {
        let (temp_dir, mut book) = create_test_book();

        let (index, loan) = book
            .apply(acct(123456), Money::from_cents(1_000_000), dec!(12), 12, start())
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(loan.balance, loan.principal);
        assert_eq!(loan.monthly_payment, Money::from_cents(88_849));

        let contents = fs::read_to_string(temp_dir.path().join("loans.csv")).unwrap();
        assert_eq!(
            contents,
            "account,principal,interest_rate,term_months,start_date,balance\n\
             123456,10000.00,12,12,2024-01-15,10000.00\n"
        );

        let mut reloaded = LoanBook::new(temp_dir.path().join("loans.csv"));
        reloaded.load().unwrap();
        assert_eq!(reloaded.get(acct(123456), 1).unwrap(), &loan);
    }

    #[test]
    fn test_apply_rejects_bad_terms() {
        let (_temp_dir, mut book) = create_test_book();

        let err = book
            .apply(acct(123456), Money::zero(), dec!(5), 12, start())
            .unwrap_err();
        assert!(err.is_validation());

        let err = book
            .apply(acct(123456), Money::from_cents(100), dec!(5), 0, start())
            .unwrap_err();
        assert!(err.is_validation());

        let err = book
            .apply(acct(123456), Money::from_cents(100), dec!(-1), 12, start())
            .unwrap_err();
        assert!(err.is_validation());

        assert!(book.all().is_empty());
    }

    #[test]
    fn test_indices_are_per_account() {
        let (_temp_dir, mut book) = create_test_book();

        book.apply(acct(111111), Money::from_cents(100_000), dec!(0), 10, start())
            .unwrap();
        book.apply(acct(222222), Money::from_cents(200_000), dec!(0), 10, start())
            .unwrap();
        let (index, _) = book
            .apply(acct(111111), Money::from_cents(300_000), dec!(0), 10, start())
            .unwrap();

        assert_eq!(index, 2);
        assert_eq!(
            book.get(acct(111111), 2).unwrap().principal,
            Money::from_cents(300_000)
        );
        assert_eq!(book.loans_for(acct(111111)).len(), 2);
        book.pay(acct(111111), 2, Money::from_cents(50_000)).unwrap();
        let totals = book.totals();
        assert_eq!(
            totals[&acct(111111)],
            (Money::from_cents(400_000), Money::from_cents(50_000))
        );
        assert_eq!(totals[&acct(222222)], (Money::from_cents(200_000), Money::zero()));
        assert!(book.get(acct(111111), 3).unwrap_err().is_not_found());
        assert!(book.get(acct(111111), 0).unwrap_err().is_not_found());
    }

    #[test]
    fn test_pay_clamps_to_balance() {
        let (_temp_dir, mut book) = create_test_book();
        book.apply(acct(123456), Money::from_cents(50_000), dec!(0), 5, start())
            .unwrap();

        let (applied, loan) = book
            .pay(acct(123456), 1, Money::from_cents(20_000))
            .unwrap();
        assert_eq!(applied, Money::from_cents(20_000));
        assert_eq!(loan.balance, Money::from_cents(30_000));

        let (applied, loan) = book
            .pay(acct(123456), 1, Money::from_cents(99_999))
            .unwrap();
        assert_eq!(applied, Money::from_cents(30_000));
        assert!(loan.is_repaid());

        let err = book.pay(acct(123456), 1, Money::from_cents(1)).unwrap_err();
        assert!(err.is_validation());

        let err = book.pay(acct(123456), 1, Money::zero()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_failed_save_rolls_back_payment() {
        let (temp_dir, mut book) = create_test_book();
        book.apply(acct(123456), Money::from_cents(50_000), dec!(0), 5, start())
            .unwrap();

        let path = temp_dir.path().join("loans.csv");
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = book
            .pay(acct(123456), 1, Money::from_cents(10_000))
            .unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(
            book.get(acct(123456), 1).unwrap().balance,
            Money::from_cents(50_000)
        );
    }

    #[test]
    fn test_schedule_ends_at_zero() {
        let (_temp_dir, mut book) = create_test_book();
        book.apply(acct(123456), Money::from_cents(1_000_000), dec!(12), 12, start())
            .unwrap();

        let rows = book.schedule(acct(123456), 1).unwrap();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].interest, Money::from_cents(10_000));
        assert_eq!(rows.last().unwrap().remaining, Money::zero());

        let principal: Money = rows.iter().map(|r| r.principal).sum();
        assert_eq!(principal, Money::from_cents(1_000_000));
    }
}
