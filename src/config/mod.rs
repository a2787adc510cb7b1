//! Configuration module for the ledger
//!
//! This module provides configuration management including:
//! - Data directory resolution
//! - Settings persistence

pub mod paths;
pub mod settings;

pub use paths::LedgerPaths;
pub use settings::Settings;
