//! Transaction model
//!
//! One immutable row of the ledger. Every balance-affecting event on an
//! account produces exactly one of these; transfers produce a linked pair.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::AccountNumber;
use super::money::Money;

/// Timestamp format used in the transactions table
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of ledger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    TransferIn,
    TransferOut,
    LoanDisbursal,
    LoanPayment,
}

impl TransactionType {
    /// Signed effect of an entry of this kind on the account balance
    ///
    /// `LoanPayment` returns `None`: it moves a loan balance, not the
    /// account balance, and its `balance_after` lives in the loan namespace.
    pub fn account_delta(&self, amount: Money) -> Option<Money> {
        match self {
            Self::Deposit | Self::TransferIn | Self::LoanDisbursal => Some(amount),
            Self::Withdraw | Self::TransferOut => Some(-amount),
            Self::LoanPayment => None,
        }
    }

    /// Whether entries of this kind move the account balance
    pub fn affects_account_balance(&self) -> bool {
        !matches!(self, Self::LoanPayment)
    }

    /// Parse a transaction type from its table name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DEPOSIT" => Some(Self::Deposit),
            "WITHDRAW" => Some(Self::Withdraw),
            "TRANSFER_IN" => Some(Self::TransferIn),
            "TRANSFER_OUT" => Some(Self::TransferOut),
            "LOAN_DISBURSAL" => Some(Self::LoanDisbursal),
            "LOAN_PAYMENT" => Some(Self::LoanPayment),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdraw => "WITHDRAW",
            Self::TransferIn => "TRANSFER_IN",
            Self::TransferOut => "TRANSFER_OUT",
            Self::LoanDisbursal => "LOAN_DISBURSAL",
            Self::LoanPayment => "LOAN_PAYMENT",
        };
        f.write_str(s)
    }
}

/// A single ledger entry
///
/// Field order matches the column order of the transactions table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Account the entry is recorded against
    pub account: AccountNumber,

    /// When the event was recorded (second resolution)
    #[serde(rename = "datetime", with = "datetime_format")]
    pub timestamp: NaiveDateTime,

    #[serde(rename = "type")]
    pub kind: TransactionType,

    /// Always positive; direction comes from `kind`
    pub amount: Money,

    /// Account balance after this entry, or the loan balance for `LoanPayment`
    #[serde(rename = "balance")]
    pub balance_after: Money,
}

impl Transaction {
    /// Create a new ledger entry
    pub fn new(
        account: AccountNumber,
        kind: TransactionType,
        amount: Money,
        balance_after: Money,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            account,
            timestamp,
            kind,
            amount,
            balance_after,
        }
    }

    /// Signed effect on the account balance, if any
    pub fn account_delta(&self) -> Option<Money> {
        self.kind.account_delta(self.amount)
    }

    /// Validate the entry
    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if !self.amount.is_positive() {
            return Err(TransactionValidationError::NonPositiveAmount(self.amount));
        }
        if self.balance_after.is_negative() {
            return Err(TransactionValidationError::NegativeBalance(self.balance_after));
        }
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} (balance {})",
            self.timestamp.format(DATETIME_FORMAT),
            self.kind,
            self.amount,
            self.balance_after
        )
    }
}

/// Validation errors for transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    NonPositiveAmount(Money),
    NegativeBalance(Money),
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveAmount(a) => write!(f, "Transaction amount must be positive, got {}", a),
            Self::NegativeBalance(b) => write!(f, "Balance after transaction cannot be negative: {}", b),
        }
    }
}

impl std::error::Error for TransactionValidationError {}

mod datetime_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATETIME_FORMAT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(DATETIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).map_err(serde::de::Error::custom)
    }
}
