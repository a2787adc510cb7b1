//! Backup manager for the ledger tables
//!
//! Copies each live table into `backups/<YYYYMMDD_HHMMSS>_<filename>`.
//! One call produces one backup set: every table copied under the same
//! timestamp. Live files are only ever read.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, SubsecRound};

use crate::config::LedgerPaths;
use crate::error::{LedgerError, LedgerResult};
use crate::storage::file_io::{complete_records, write_bytes_atomic};

/// Timestamp prefix format of backup file names
pub const BACKUP_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const STAMP_LEN: usize = 15;

/// Files sharing one backup timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    /// Timestamp prefix, e.g. `20240301_093005`
    pub stamp: String,
    pub created_at: NaiveDateTime,
    /// Snapshot files, sorted by name
    pub files: Vec<PathBuf>,
}

impl BackupSet {
    pub fn size_bytes(&self) -> u64 {
        self.files
            .iter()
            .filter_map(|f| fs::metadata(f).ok())
            .map(|m| m.len())
            .sum()
    }
}

/// Manages backup creation and retention
pub struct BackupManager {
    backup_dir: PathBuf,
    sources: Vec<PathBuf>,
    /// Number of backup sets to keep; 0 keeps everything
    max_sets: usize,
}

impl BackupManager {
    /// Back up the three ledger tables
    pub fn new(paths: &LedgerPaths, max_sets: usize) -> Self {
        Self::with_sources(paths.backup_dir(), paths.table_files().to_vec(), max_sets)
    }

    /// Back up an arbitrary list of files into `backup_dir`
    pub fn with_sources(backup_dir: PathBuf, sources: Vec<PathBuf>, max_sets: usize) -> Self {
        Self {
            backup_dir,
            sources,
            max_sets,
        }
    }

    /// Snapshot every source that exists
    ///
    /// Missing sources are skipped. A failure on one file does not stop the
    /// others; the first error is returned once all have been attempted.
    pub fn create_backup(&self) -> LedgerResult<BackupSet> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| {
            LedgerError::Persistence(format!("Failed to create backup directory: {}", e))
        })?;

        let created_at = Local::now().naive_local().trunc_subsecs(0);
        let stamp = created_at.format(BACKUP_STAMP_FORMAT).to_string();

        let mut files = Vec::new();
        let mut first_error = None;

        for source in &self.sources {
            let Some(name) = source.file_name() else {
                continue;
            };
            let target = self
                .backup_dir
                .join(format!("{}_{}", stamp, name.to_string_lossy()));

            match snapshot_file(source, &target) {
                Ok(true) => files.push(target),
                Ok(false) => tracing::debug!(source = %source.display(), "backup source missing; skipped"),
                Err(e) => {
                    tracing::warn!(source = %source.display(), error = %e, "failed to back up file");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        files.sort();
        Ok(BackupSet {
            stamp,
            created_at,
            files,
        })
    }

    /// All backup sets, newest first
    pub fn list_backups(&self) -> LedgerResult<Vec<BackupSet>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut sets: BTreeMap<String, BackupSet> = BTreeMap::new();

        for entry in fs::read_dir(&self.backup_dir).map_err(|e| {
            LedgerError::Persistence(format!("Failed to read backup directory: {}", e))
        })? {
            let entry = entry.map_err(|e| {
                LedgerError::Persistence(format!("Failed to read directory entry: {}", e))
            })?;

            let path = entry.path();
            let Some((stamp, created_at)) = parse_backup_name(&path) else {
                continue;
            };

            sets.entry(stamp.clone())
                .or_insert_with(|| BackupSet {
                    stamp,
                    created_at,
                    files: Vec::new(),
                })
                .files
                .push(path);
        }

        let mut sets: Vec<BackupSet> = sets.into_values().rev().collect();
        for set in &mut sets {
            set.files.sort();
        }
        Ok(sets)
    }

    /// Delete the oldest backup sets beyond the retention limit
    pub fn enforce_retention(&self) -> LedgerResult<Vec<PathBuf>> {
        if self.max_sets == 0 {
            return Ok(Vec::new());
        }

        let mut deleted = Vec::new();
        for set in self.list_backups()?.into_iter().skip(self.max_sets) {
            for file in set.files {
                fs::remove_file(&file).map_err(|e| {
                    LedgerError::Persistence(format!("Failed to delete old backup: {}", e))
                })?;
                deleted.push(file);
            }
        }

        Ok(deleted)
    }

    /// Create a backup and then enforce the retention policy
    pub fn create_backup_with_retention(&self) -> LedgerResult<(BackupSet, Vec<PathBuf>)> {
        let set = self.create_backup()?;
        let deleted = self.enforce_retention()?;
        Ok((set, deleted))
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }
}

/// Copy the complete records of `source` into `target`
///
/// Reads the source once and keeps only bytes up to the last newline, so a
/// record being appended concurrently is never captured half-written. The
/// snapshot lands through temp-then-rename. Returns `false` if the source
/// doesn't exist.
fn snapshot_file(source: &Path, target: &Path) -> LedgerResult<bool> {
    let bytes = match fs::read(source) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(LedgerError::Persistence(format!(
                "Failed to read {} for backup: {}",
                source.display(),
                e
            )))
        }
    };

    write_bytes_atomic(target, complete_records(&bytes))?;
    Ok(true)
}

fn parse_stamp(stamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(stamp, BACKUP_STAMP_FORMAT).ok()
}

/// Split `<stamp>_<filename>` into its stamp and creation time
fn parse_backup_name(path: &Path) -> Option<(String, NaiveDateTime)> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with(".tmp") {
        return None;
    }

    let stamp = name.get(..STAMP_LEN)?;
    let rest = name.get(STAMP_LEN..)?;
    if !rest.starts_with('_') || rest.len() < 2 {
        return None;
    }

    let created_at = parse_stamp(stamp)?;
    Some((stamp.to_string(), created_at))
}
