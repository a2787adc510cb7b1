//! Audit trail for the ledger
//!
//! Every state-changing operation, and every refused one, leaves a line in
//! an append-only text log:
//!
//! ```text
//! 2024-03-01 09:00:00 INFO ACTION=DEPOSIT ACCOUNT=123456 DETAILS=amount=500.00
//! ```
//!
//! - `AuditEntry`: one line of the log, with level, action, optional
//!   account and optional free-text details.
//! - `AuditLogger`: owns the open log file. Writes are best effort; a
//!   failure is reported through `tracing` and never aborts the operation
//!   being audited.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledger::audit::{AuditAction, AuditLogger};
//!
//! let audit = AuditLogger::open(paths.audit_log())?;
//! audit.info(AuditAction::Deposit, Some(number), "amount=500.00");
//! audit.close();
//! ```

mod entry;
mod logger;

pub use entry::{AuditAction, AuditEntry, AuditLevel};
pub use logger::AuditLogger;
