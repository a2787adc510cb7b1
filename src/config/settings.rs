//! Ledger settings
//!
//! User-tunable knobs persisted as `config.json`: backup cadence and
//! retention, account number allocation, and display currency.

use serde::{Deserialize, Serialize};

use super::paths::LedgerPaths;
use crate::error::LedgerError;

/// Settings for the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Minutes between periodic backups
    #[serde(default = "default_backup_interval")]
    pub backup_interval_minutes: u64,

    /// Number of backup sets to keep; 0 keeps everything
    #[serde(default)]
    pub max_backup_sets: usize,

    /// Random probes before falling back to a linear sweep when
    /// allocating an account number
    #[serde(default = "default_number_attempts")]
    pub account_number_attempts: u32,

    /// Currency symbol used when rendering amounts
    #[serde(default = "default_currency")]
    pub currency_symbol: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_backup_interval() -> u64 {
    60
}

fn default_number_attempts() -> u32 {
    64
}

fn default_currency() -> String {
    "Rs".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            backup_interval_minutes: default_backup_interval(),
            max_backup_sets: 0,
            account_number_attempts: default_number_attempts(),
            currency_symbol: default_currency(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &LedgerPaths) -> Result<Self, LedgerError> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            // Don't save yet - let caller decide when to persist
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| LedgerError::Config(format!("Failed to read settings file: {}", e)))?;

        let settings: Settings = serde_json::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("Failed to parse settings file: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.backup_interval_minutes == 0 {
            return Err(LedgerError::Config(
                "backup_interval_minutes must be at least 1".into(),
            ));
        }
        if self.account_number_attempts == 0 {
            return Err(LedgerError::Config(
                "account_number_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Backup period as a duration
    pub fn backup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.backup_interval_minutes.saturating_mul(60))
    }

    /// Save settings to disk
    pub fn save(&self, paths: &LedgerPaths) -> Result<(), LedgerError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| LedgerError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents).map_err(|e| {
            LedgerError::Persistence(format!("Failed to write settings file: {}", e))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.backup_interval_minutes, 60);
        assert_eq!(settings.max_backup_sets, 0);
        assert_eq!(settings.backup_interval().as_secs(), 3600);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());

        let settings = Settings {
            backup_interval_minutes: 15,
            max_backup_sets: 5,
            ..Settings::default()
        };
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), r#"{"max_backup_sets": 3}"#).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.max_backup_sets, 3);
        assert_eq!(loaded.backup_interval_minutes, 60);
        assert_eq!(loaded.currency_symbol, "Rs");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), r#"{"backup_interval_minutes": 0}"#).unwrap();

        let err = Settings::load_or_create(&paths).unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }
}
