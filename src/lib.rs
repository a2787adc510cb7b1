//! Single-node account ledger
//!
//! Accounts with an append-only transaction history, loans with fixed
//! monthly payments, an audit trail and periodic backups. Everything is
//! kept in plain CSV files under one data directory.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Core data models (accounts, transactions, loans, money)
//! - `storage`: CSV tables: accounts, the transaction ledger, loans
//! - `services`: The [`services::Ledger`] facade every caller goes through
//! - `audit`: Audit logging system
//! - `backup`: Backup snapshots and the periodic backup task
//! - `crypto`: Password hashing
//! - `cli`, `display`: Command-line front end
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ledger::audit::AuditLogger;
//! use ledger::config::{LedgerPaths, Settings};
//! use ledger::services::Ledger;
//!
//! let paths = LedgerPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let audit = Arc::new(AuditLogger::open(paths.audit_log())?);
//! let ledger = Ledger::open(paths, settings, audit)?;
//! ```

pub mod audit;
pub mod backup;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{LedgerError, LedgerResult};
