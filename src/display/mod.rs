//! Display formatting for terminal output
//!
//! Formats accounts, ledger entries, loans and backups as plain-text tables.

pub mod account;
pub mod backup;
pub mod loan;
pub mod transaction;

pub use account::{format_account_details, format_account_list};
pub use backup::{format_audit_entries, format_backup_list};
pub use loan::{format_loan_list, format_schedule};
pub use transaction::{format_statement, format_transaction_register, format_transaction_row};
