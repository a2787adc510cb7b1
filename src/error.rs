//! Error types for the ledger engine
//!
//! Every fallible operation returns a [`LedgerError`]. The variants form a
//! closed set so callers can match on the kind of failure instead of
//! inspecting messages.

use thiserror::Error;

use crate::models::{AccountNumber, Money};

/// The main error type for ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input or a violated precondition (non-positive amount, etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Frozen account, wrong credentials or unauthenticated access
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Withdrawal or transfer exceeds the available balance
    #[error("Insufficient funds in account {account}: need {needed}, have {available}")]
    InsufficientFunds {
        account: AccountNumber,
        needed: Money,
        available: Money,
    },

    /// A durable write or read of a persisted table failed
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl LedgerError {
    /// Create a "not found" error for accounts
    pub fn account_not_found(identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: "Account",
            identifier: identifier.to_string(),
        }
    }

    /// Create a "not found" error for loans
    pub fn loan_not_found(identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: "Loan",
            identifier: identifier.to_string(),
        }
    }

    /// Create a permission error for an operation on a frozen account
    pub fn frozen(account: AccountNumber) -> Self {
        Self::Permission(format!("account {} is frozen", account))
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a permission error
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Permission(_))
    }

    /// Check if this is an insufficient funds error
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, Self::InsufficientFunds { .. })
    }

    /// Check if this is a persistence error
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<csv::Error> for LedgerError {
    fn from(err: csv::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
