//! Password hashing using Argon2id
//!
//! Account passwords are stored as PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`) so the salt and
//! parameters travel with the hash. Plaintext never reaches disk.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{LedgerError, LedgerResult};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 4;

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> LedgerResult<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(LedgerError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| LedgerError::Validation(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash
///
/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
