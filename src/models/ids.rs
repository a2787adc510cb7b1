//! Account number newtype
//!
//! Account numbers are six-digit identifiers. Wrapping them in a newtype
//! keeps them from being mixed up with amounts, indexes or loan terms at
//! compile time, and guarantees the range on every path that builds one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Smallest issuable account number
pub const MIN_ACCOUNT_NUMBER: u32 = 100_000;

/// Largest issuable account number
pub const MAX_ACCOUNT_NUMBER: u32 = 999_999;

/// A six-digit account number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct AccountNumber(u32);

impl AccountNumber {
    /// The full range of issuable numbers
    pub const RANGE: RangeInclusive<u32> = MIN_ACCOUNT_NUMBER..=MAX_ACCOUNT_NUMBER;

    /// Create an account number, rejecting values outside the six-digit range
    pub fn new(value: u32) -> Result<Self, AccountNumberError> {
        if Self::RANGE.contains(&value) {
            Ok(Self(value))
        } else {
            Err(AccountNumberError::OutOfRange(value.to_string()))
        }
    }

    /// Get the numeric value
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Parse an account number from user input
    pub fn parse(s: &str) -> Result<Self, AccountNumberError> {
        let s = s.trim();
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AccountNumberError::OutOfRange(s.to_string()));
        }
        let value: u32 = s
            .parse()
            .map_err(|_| AccountNumberError::OutOfRange(s.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = AccountNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<u32> for AccountNumber {
    type Error = AccountNumberError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountNumber> for u32 {
    fn from(number: AccountNumber) -> Self {
        number.0
    }
}

/// Error for account numbers outside the six-digit range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountNumberError {
    OutOfRange(String),
}

impl fmt::Display for AccountNumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(s) => write!(f, "Invalid account number (expected 6 digits): {}", s),
        }
    }
}

impl std::error::Error for AccountNumberError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        assert!(AccountNumber::new(100_000).is_ok());
        assert!(AccountNumber::new(999_999).is_ok());
        assert!(AccountNumber::new(99_999).is_err());
        assert!(AccountNumber::new(1_000_000).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!(AccountNumber::parse("123456").unwrap().value(), 123456);
        assert_eq!(AccountNumber::parse(" 654321 ").unwrap().value(), 654321);
        assert!(AccountNumber::parse("012345").is_err());
        assert!(AccountNumber::parse("12345").is_err());
        assert!(AccountNumber::parse("12a456").is_err());
        assert!(AccountNumber::parse("+12345").is_err());
    }

    #[test]
    fn test_serialization() {
        let number = AccountNumber::new(424242).unwrap();
        let json = serde_json::to_string(&number).unwrap();
        assert_eq!(json, "424242");

        let back: AccountNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(number, back);

        assert!(serde_json::from_str::<AccountNumber>("42").is_err());
    }
}
