//! Loan model and amortization math
//!
//! A loan is an amortizing annuity against an account. The monthly payment
//! is a pure function of principal, annual rate and term, so it is not
//! persisted; it is recomputed whenever a loan is built or loaded.

use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::AccountNumber;
use super::money::Money;

/// Monthly periodic rate for an annual percentage rate
pub fn monthly_rate(annual_rate_pct: Decimal) -> Decimal {
    annual_rate_pct / Decimal::from(12) / Decimal::ONE_HUNDRED
}

/// Standard amortizing-annuity payment, rounded to the cent
///
/// `r = annual / 12 / 100`; zero rate gives `principal / term`, otherwise
/// `P·r·(1+r)^n / ((1+r)^n − 1)`. Returns `None` for a zero term or when
/// the computation overflows.
pub fn monthly_payment(principal: Money, annual_rate_pct: Decimal, term_months: u32) -> Option<Money> {
    if term_months == 0 {
        return None;
    }

    let p = principal.to_decimal();
    let r = monthly_rate(annual_rate_pct);

    let payment = if r.is_zero() {
        p.checked_div(Decimal::from(term_months))?
    } else {
        let growth = (Decimal::ONE + r).checked_powu(u64::from(term_months))?;
        let numerator = p.checked_mul(r)?.checked_mul(growth)?;
        numerator.checked_div(growth - Decimal::ONE)?
    };

    Money::from_decimal(payment)
}

/// An amortizing loan, one row of the loans table
///
/// Field order matches the column order of the loans table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Owning account; it may since have been closed
    pub account: AccountNumber,

    pub principal: Money,

    /// Annual interest rate in percent (e.g. `12` for 12%)
    pub interest_rate: Decimal,

    pub term_months: u32,

    /// Disbursal date (`YYYY-MM-DD`)
    pub start_date: NaiveDate,

    /// Remaining principal; starts at `principal` and only goes down
    pub balance: Money,

    #[serde(skip)]
    pub monthly_payment: Money,
}

impl Loan {
    /// Create a new loan with the full principal outstanding
    pub fn new(
        account: AccountNumber,
        principal: Money,
        interest_rate: Decimal,
        term_months: u32,
        start_date: NaiveDate,
    ) -> Result<Self, LoanValidationError> {
        validate_terms(principal, interest_rate, term_months)?;
        let monthly_payment = monthly_payment(principal, interest_rate, term_months)
            .ok_or(LoanValidationError::OutOfRange)?;

        Ok(Self {
            account,
            principal,
            interest_rate,
            term_months,
            start_date,
            balance: principal,
            monthly_payment,
        })
    }

    /// Recompute derived fields after deserialization
    pub fn with_derived(mut self) -> Result<Self, LoanValidationError> {
        validate_terms(self.principal, self.interest_rate, self.term_months)?;
        if self.balance.is_negative() || self.balance > self.principal {
            return Err(LoanValidationError::BalanceOutOfRange(self.balance));
        }
        self.monthly_payment = monthly_payment(self.principal, self.interest_rate, self.term_months)
            .ok_or(LoanValidationError::OutOfRange)?;
        Ok(self)
    }

    pub fn is_repaid(&self) -> bool {
        self.balance.is_zero()
    }

    /// Amount that a payment of `amount` would actually apply
    pub fn clamp_payment(&self, amount: Money) -> Money {
        amount.min(self.balance)
    }

    /// Full amortization table from the original principal
    ///
    /// The final row absorbs rounding so the remaining balance lands on
    /// exactly zero.
    pub fn schedule(&self) -> Vec<AmortizationRow> {
        let r = monthly_rate(self.interest_rate);
        let mut remaining = self.principal;
        let mut rows = Vec::with_capacity(self.term_months as usize);

        for period in 1..=self.term_months {
            let interest = Money::from_decimal(remaining.to_decimal() * r).unwrap_or_default();
            let mut principal_part = self.monthly_payment - interest;

            if period == self.term_months || principal_part > remaining {
                principal_part = remaining;
            }

            remaining -= principal_part;
            rows.push(AmortizationRow {
                period,
                payment: principal_part + interest,
                interest,
                principal: principal_part,
                remaining,
            });

            if remaining.is_zero() {
                break;
            }
        }

        rows
    }
}

fn validate_terms(
    principal: Money,
    interest_rate: Decimal,
    term_months: u32,
) -> Result<(), LoanValidationError> {
    if !principal.is_positive() {
        return Err(LoanValidationError::NonPositivePrincipal(principal));
    }
    if term_months == 0 {
        return Err(LoanValidationError::InvalidTerm(term_months));
    }
    if interest_rate.is_sign_negative() && !interest_rate.is_zero() {
        return Err(LoanValidationError::NegativeRate(interest_rate));
    }
    Ok(())
}

/// One period of an amortization schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmortizationRow {
    pub period: u32,
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    pub remaining: Money,
}

impl fmt::Display for Loan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}% for {} months, {} outstanding",
            self.principal, self.interest_rate, self.term_months, self.balance
        )
    }
}

/// Validation errors for loans
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanValidationError {
    NonPositivePrincipal(Money),
    InvalidTerm(u32),
    NegativeRate(Decimal),
    BalanceOutOfRange(Money),
    OutOfRange,
}

impl fmt::Display for LoanValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositivePrincipal(p) => write!(f, "Loan principal must be positive, got {}", p),
            Self::InvalidTerm(t) => write!(f, "Loan term must be at least 1 month, got {}", t),
            Self::NegativeRate(r) => write!(f, "Interest rate cannot be negative, got {}%", r),
            Self::BalanceOutOfRange(b) => write!(f, "Loan balance out of range: {}", b),
            Self::OutOfRange => write!(f, "Loan terms are too large to amortize"),
        }
    }
}

impl std::error::Error for LoanValidationError {}
