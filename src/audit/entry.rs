//! Audit entry data structures
//!
//! Defines the actions and severity levels that can be audited and the
//! line format of the log itself.

use chrono::{Local, NaiveDateTime, SubsecRound};
use std::fmt;

use crate::models::AccountNumber;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_LEN: usize = 19;

/// Severity of an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    /// The operation succeeded
    Info,
    /// The operation was refused (bad input, frozen account, wrong password)
    Warning,
    /// The operation failed for a system reason
    Error,
}

impl AuditLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(Self::Info),
            "WARNING" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditLevel::Info => write!(f, "INFO"),
            AuditLevel::Warning => write!(f, "WARNING"),
            AuditLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Operations that leave an audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    CreateAccount,
    Login,
    Deposit,
    Withdraw,
    Transfer,
    Freeze,
    Unfreeze,
    CloseAccount,
    UpdateProfile,
    ChangePassword,
    ApplyLoan,
    PayLoan,
    Reconcile,
    Backup,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateAccount => "CREATE_ACCOUNT",
            AuditAction::Login => "LOGIN",
            AuditAction::Deposit => "DEPOSIT",
            AuditAction::Withdraw => "WITHDRAW",
            AuditAction::Transfer => "TRANSFER",
            AuditAction::Freeze => "FREEZE",
            AuditAction::Unfreeze => "UNFREEZE",
            AuditAction::CloseAccount => "CLOSE_ACCOUNT",
            AuditAction::UpdateProfile => "UPDATE_PROFILE",
            AuditAction::ChangePassword => "CHANGE_PASSWORD",
            AuditAction::ApplyLoan => "APPLY_LOAN",
            AuditAction::PayLoan => "PAY_LOAN",
            AuditAction::Reconcile => "RECONCILE",
            AuditAction::Backup => "BACKUP",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Local time the entry was recorded
    pub timestamp: NaiveDateTime,

    pub level: AuditLevel,

    /// Action name, e.g. `DEPOSIT`
    pub action: String,

    pub account: Option<AccountNumber>,

    /// Free text; kept on one line
    pub details: Option<String>,
}

impl AuditEntry {
    /// Create an entry stamped with the current local time
    pub fn new(
        level: AuditLevel,
        action: impl fmt::Display,
        account: Option<AccountNumber>,
        details: Option<String>,
    ) -> Self {
        let action: String = action
            .to_string()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        let details = details
            .map(|d| d.replace(['\r', '\n'], " ").trim().to_string())
            .filter(|d| !d.is_empty());

        Self {
            timestamp: Local::now().naive_local().trunc_subsecs(0),
            level,
            action,
            account,
            details,
        }
    }

    /// Render as a log line (without trailing newline)
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "{} {} ACTION={}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            self.action
        );

        if let Some(account) = self.account {
            line.push_str(&format!(" ACCOUNT={}", account));
        }

        if let Some(details) = &self.details {
            line.push_str(&format!(" DETAILS={}", details));
        }

        line
    }

    /// Parse a log line written by [`AuditEntry::format_line`]
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end();
        let timestamp = line.get(..TIMESTAMP_LEN)?;
        let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;

        let rest = line.get(TIMESTAMP_LEN..)?.trim_start();
        let (level, rest) = rest.split_once(' ')?;
        let level = AuditLevel::parse(level)?;

        let rest = rest.strip_prefix("ACTION=")?;
        let (action, mut rest) = match rest.split_once(' ') {
            Some((action, rest)) => (action, rest),
            None => (rest, ""),
        };

        let mut account = None;
        if let Some(after) = rest.strip_prefix("ACCOUNT=") {
            let (number, tail) = after.split_once(' ').unwrap_or((after, ""));
            account = Some(AccountNumber::parse(number).ok()?);
            rest = tail;
        }

        let details = match rest.strip_prefix("DETAILS=") {
            Some(details) => Some(details.to_string()),
            None if rest.is_empty() => None,
            None => return None,
        };

        Some(Self {
            timestamp,
            level,
            action: action.to_string(),
            account,
            details,
        })
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_line())
    }
}
