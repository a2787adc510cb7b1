//! Backup system for the ledger
//!
//! Periodic snapshots of the three tables, with optional retention.
//!
//! - `BackupManager`: copies the live tables into timestamped files and
//!   prunes old sets.
//! - `BackupScheduler`: a background tokio task that runs the manager on a
//!   fixed cadence until it is shut down.
//!
//! # Backup Format
//!
//! Each table is copied to `backups/<YYYYMMDD_HHMMSS>_<filename>`. A copy
//! holds only complete records and appears atomically.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledger::backup::{BackupManager, BackupScheduler};
//!
//! let manager = BackupManager::new(&paths, settings.max_backup_sets);
//! let scheduler = BackupScheduler::start(manager, settings.backup_interval(), audit);
//! // ...
//! scheduler.shutdown().await;
//! ```

mod manager;
mod scheduler;

pub use manager::{BackupManager, BackupSet, BACKUP_STAMP_FORMAT};
pub use scheduler::BackupScheduler;
