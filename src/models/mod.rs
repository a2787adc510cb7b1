//! Core data models for the ledger
//!
//! Accounts, ledger entries and loans, plus the `Money` and
//! `AccountNumber` value types they are built from.

pub mod account;
pub mod ids;
pub mod loan;
pub mod money;
pub mod transaction;

pub use account::{Account, AccountStatus, ProfileField};
pub use ids::AccountNumber;
pub use loan::{AmortizationRow, Loan};
pub use money::Money;
pub use transaction::{Transaction, TransactionType};
