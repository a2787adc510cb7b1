//! Cryptographic functions for the ledger
//!
//! Account passwords are hashed with Argon2id before they reach the
//! accounts table.

pub mod password;

pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
