//! Service layer for the ledger
//!
//! Business rules on top of the storage layer: validation, the commit order
//! across tables, and the audit trail.

pub mod ledger;

pub use ledger::{Ledger, LedgerCheck, LoanPaymentResult, Statement, TransferResult};
