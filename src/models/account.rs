//! Account model
//!
//! A customer account: identity, contact details, credential hash and the
//! cached balance. The balance here is a cache of the ledger; see
//! `storage::transactions` for the authoritative log.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::AccountNumber;
use super::money::Money;

/// Lifecycle state of an account as seen through the facade
///
/// `Closed` is never stored: a closed account is simply absent from the
/// accounts table while its ledger history remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Frozen,
    Closed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Frozen => write!(f, "Frozen"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Editable profile fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    Email,
    Phone,
}

impl ProfileField {
    /// Parse a profile field from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "name" => Some(Self::Name),
            "email" | "mail" => Some(Self::Email),
            "phone" | "mobile" => Some(Self::Phone),
            _ => None,
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Email => write!(f, "email"),
            Self::Phone => write!(f, "phone"),
        }
    }
}

/// A customer account, one row of the accounts table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique six-digit account number
    pub number: AccountNumber,

    /// Holder's name
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub phone: String,

    /// Argon2 PHC string; the plaintext is never stored
    pub password_hash: String,

    /// Current balance, never negative
    pub balance: Money,

    /// Frozen accounts may be queried but not moved
    #[serde(rename = "frozen")]
    pub is_frozen: bool,
}

impl Account {
    /// Create a new account with zero balance in the active state
    pub fn new(
        number: AccountNumber,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            number,
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            password_hash: password_hash.into(),
            balance: Money::zero(),
            is_frozen: false,
        }
    }

    /// Current lifecycle status
    pub fn status(&self) -> AccountStatus {
        if self.is_frozen {
            AccountStatus::Frozen
        } else {
            AccountStatus::Active
        }
    }

    /// Read a profile field
    pub fn profile(&self, field: ProfileField) -> &str {
        match field {
            ProfileField::Name => &self.name,
            ProfileField::Email => &self.email,
            ProfileField::Phone => &self.phone,
        }
    }

    /// Overwrite a profile field
    pub fn set_profile(&mut self, field: ProfileField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ProfileField::Name => self.name = value,
            ProfileField::Email => self.email = value,
            ProfileField::Phone => self.phone = value,
        }
    }

    /// Validate the account
    pub fn validate(&self) -> Result<(), AccountValidationError> {
        validate_profile(ProfileField::Name, &self.name)?;
        validate_profile(ProfileField::Email, &self.email)?;
        validate_profile(ProfileField::Phone, &self.phone)?;

        if self.balance.is_negative() {
            return Err(AccountValidationError::NegativeBalance(self.balance));
        }

        Ok(())
    }
}

/// Validate a single profile value
pub fn validate_profile(field: ProfileField, value: &str) -> Result<(), AccountValidationError> {
    match field {
        ProfileField::Name => {
            if value.trim().is_empty() {
                return Err(AccountValidationError::EmptyName);
            }
            if value.len() > 100 {
                return Err(AccountValidationError::NameTooLong(value.len()));
            }
        }
        ProfileField::Email => {
            if !value.is_empty() && !value.contains('@') {
                return Err(AccountValidationError::InvalidEmail(value.to_string()));
            }
        }
        ProfileField::Phone => {
            let valid = value
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
            if !valid {
                return Err(AccountValidationError::InvalidPhone(value.to_string()));
            }
        }
    }
    Ok(())
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number, self.name)
    }
}

/// Validation errors for accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyName,
    NameTooLong(usize),
    InvalidEmail(String),
    InvalidPhone(String),
    NegativeBalance(Money),
}

impl fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Account name cannot be empty"),
            Self::NameTooLong(len) => {
                write!(f, "Account name too long ({} chars, max 100)", len)
            }
            Self::InvalidEmail(e) => write!(f, "Invalid email address: {}", e),
            Self::InvalidPhone(p) => write!(f, "Invalid phone number: {}", p),
            Self::NegativeBalance(b) => write!(f, "Balance cannot be negative: {}", b),
        }
    }
}

impl std::error::Error for AccountValidationError {}
