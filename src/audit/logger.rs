//! Audit logger for the append-only audit log
//!
//! The logger owns the open log file for the lifetime of the engine. It is
//! opened at startup, each entry is flushed as it is written, and it is
//! closed at shutdown (or when dropped).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{LedgerError, LedgerResult};
use crate::models::AccountNumber;

use super::entry::{AuditAction, AuditEntry, AuditLevel};

/// Handles writing audit entries to the audit log file
pub struct AuditLogger {
    /// Path to the audit log file; `None` for a disabled logger
    log_path: Option<PathBuf>,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl AuditLogger {
    /// Open (or create) the audit log at `log_path` for appending
    pub fn open(log_path: PathBuf) -> LedgerResult<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Persistence(format!("Failed to create audit log directory: {}", e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| LedgerError::Persistence(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            log_path: Some(log_path),
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// A logger that records nothing
    pub fn disabled() -> Self {
        Self {
            log_path: None,
            writer: Mutex::new(None),
        }
    }

    /// Record an entry
    ///
    /// Never fails: a write error is reported through `tracing` and the
    /// entry is lost.
    pub fn record(&self, entry: &AuditEntry) {
        let Ok(mut guard) = self.writer.lock() else {
            tracing::warn!(action = %entry.action, "audit log lock poisoned; entry dropped");
            return;
        };
        let Some(writer) = guard.as_mut() else {
            if self.log_path.is_some() {
                tracing::warn!(action = %entry.action, "audit log closed; entry dropped");
            }
            return;
        };

        let result = writeln!(writer, "{}", entry.format_line()).and_then(|_| writer.flush());
        if let Err(e) = result {
            tracing::warn!(action = %entry.action, error = %e, "failed to write audit entry");
        }
    }

    /// Record a successful operation
    pub fn info(&self, action: AuditAction, account: Option<AccountNumber>, details: impl Into<String>) {
        self.record(&AuditEntry::new(
            AuditLevel::Info,
            action,
            account,
            Some(details.into()),
        ));
    }

    /// Record a refused operation
    pub fn warning(&self, action: AuditAction, account: Option<AccountNumber>, details: impl Into<String>) {
        self.record(&AuditEntry::new(
            AuditLevel::Warning,
            action,
            account,
            Some(details.into()),
        ));
    }

    /// Record an operation that failed for a system reason
    pub fn error(&self, action: AuditAction, account: Option<AccountNumber>, details: impl Into<String>) {
        self.record(&AuditEntry::new(
            AuditLevel::Error,
            action,
            account,
            Some(details.into()),
        ));
    }

    /// Flush buffered output to the file
    pub fn flush(&self) {
        if let Ok(mut guard) = self.writer.lock() {
            if let Some(writer) = guard.as_mut() {
                if let Err(e) = writer.flush() {
                    tracing::warn!(error = %e, "failed to flush audit log");
                }
            }
        }
    }

    /// Flush and release the file; later entries are dropped
    pub fn close(&self) {
        if let Ok(mut guard) = self.writer.lock() {
            if let Some(mut writer) = guard.take() {
                let result = writer.flush().and_then(|_| writer.get_ref().sync_all());
                if let Err(e) = result {
                    tracing::warn!(error = %e, "failed to close audit log");
                }
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.writer.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Get the path to the audit log file
    pub fn path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Read all audit entries from the log file
    ///
    /// Returns entries in chronological order (oldest first). Lines that
    /// don't parse are skipped.
    pub fn read_all(&self) -> LedgerResult<Vec<AuditEntry>> {
        match &self.log_path {
            Some(path) => read_entries(path),
            None => Ok(Vec::new()),
        }
    }

    /// Read the most recent N entries from the log
    pub fn read_recent(&self, count: usize) -> LedgerResult<Vec<AuditEntry>> {
        let mut all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(count);
        Ok(all_entries.split_off(start))
    }
}

impl Drop for AuditLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Parse every entry of an audit log file
pub fn read_entries(path: &Path) -> LedgerResult<Vec<AuditEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| LedgerError::Persistence(format!("Failed to open audit log: {}", e)))?;

    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            LedgerError::Persistence(format!(
                "Failed to read audit log line {}: {}",
                line_num + 1,
                e
            ))
        })?;

        if line.trim().is_empty() {
            continue;
        }

        match AuditEntry::parse_line(&line) {
            Some(entry) => entries.push(entry),
            None => tracing::debug!(line = line_num + 1, "skipping unparseable audit line"),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_logger() -> (AuditLogger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::open(log_path).unwrap();
        (logger, temp_dir)
    }

    fn acct() -> AccountNumber {
        AccountNumber::new(123456).unwrap()
    }

    #[test]
    fn test_log_and_read() {
        let (logger, _temp) = create_test_logger();

        logger.info(AuditAction::Deposit, Some(acct()), "amount=500.00");

        let entries = logger.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, AuditLevel::Info);
        assert_eq!(entries[0].action, "DEPOSIT");
        assert_eq!(entries[0].account, Some(acct()));
        assert_eq!(entries[0].details.as_deref(), Some("amount=500.00"));
    }

    #[test]
    fn test_levels() {
        let (logger, _temp) = create_test_logger();

        logger.info(AuditAction::Login, Some(acct()), "ok");
        logger.warning(AuditAction::Login, Some(acct()), "wrong password");
        logger.error(AuditAction::Deposit, Some(acct()), "disk full");

        let levels: Vec<AuditLevel> = logger.read_all().unwrap().iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![AuditLevel::Info, AuditLevel::Warning, AuditLevel::Error]
        );
    }

    #[test]
    fn test_read_recent() {
        let (logger, _temp) = create_test_logger();

        for i in 0..10 {
            logger.info(AuditAction::Deposit, None, format!("n={}", i));
        }

        let recent = logger.read_recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].details.as_deref(), Some("n=7"));
        assert_eq!(recent[2].details.as_deref(), Some("n=9"));
    }

    #[test]
    fn test_close_stops_recording() {
        let (logger, _temp) = create_test_logger();

        logger.info(AuditAction::Deposit, None, "before");
        logger.close();
        assert!(!logger.is_open());
        logger.info(AuditAction::Deposit, None, "after");

        let entries = logger.read_all().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_disabled_logger() {
        let logger = AuditLogger::disabled();
        logger.info(AuditAction::Deposit, None, "ignored");
        assert!(logger.path().is_none());
        assert!(logger.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_survives_reopen() {
        let (logger, temp) = create_test_logger();
        logger.info(AuditAction::CreateAccount, Some(acct()), "name=Asha");
        drop(logger);

        let logger2 = AuditLogger::open(temp.path().join("audit.log")).unwrap();
        logger2.info(AuditAction::Login, Some(acct()), "ok");

        let entries = logger2.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "CREATE_ACCOUNT");
    }

    #[test]
    fn test_skips_foreign_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.log");
        std::fs::write(
            &path,
            "garbage\n2024-03-01 09:30:05 INFO ACTION=BACKUP DETAILS=3 files\n\n",
        )
        .unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "BACKUP");
    }
}
