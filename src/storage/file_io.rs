//! File I/O utilities with atomic writes
//!
//! Provides the two write disciplines the tables rely on:
//!
//! - whole-table rewrites go to a temp file in the same directory, are
//!   synced, then renamed over the live file, so a concurrent reader sees
//!   either the old or the new table and never a mix;
//! - appends serialize every record first and hand the bytes to a single
//!   `write_all` followed by `sync_data`, so a record is never interleaved
//!   with another writer's and is durable when the call returns.
//!
//! Readers keep only newline-terminated records; a torn tail left by a
//! crash mid-append is dropped with a warning.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::LedgerError;

/// Slice of `bytes` up to and including the last newline
///
/// Anything after the final `\n` is an incomplete record.
pub fn complete_records(bytes: &[u8]) -> &[u8] {
    match bytes.iter().rposition(|&b| b == b'\n') {
        Some(idx) => &bytes[..=idx],
        None => &[],
    }
}

/// Read every record of a CSV table, returning an empty table if the file doesn't exist
pub fn read_csv<T, P>(path: P) -> Result<Vec<T>, LedgerError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(Vec::new());
    }

    let bytes = fs::read(path).map_err(|e| {
        LedgerError::Persistence(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let complete = complete_records(&bytes);
    if complete.len() != bytes.len() {
        tracing::warn!(
            path = %path.display(),
            dropped_bytes = bytes.len() - complete.len(),
            "dropping incomplete trailing record"
        );
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(complete);

    let mut rows = Vec::new();
    for (idx, record) in reader.deserialize().enumerate() {
        let row: T = record.map_err(|e| {
            LedgerError::Persistence(format!(
                "Failed to parse {} record {}: {}",
                path.display(),
                idx + 1,
                e
            ))
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Truncate a torn trailing record so later appends start on a fresh line
///
/// Returns the number of bytes removed.
pub fn truncate_torn_tail<P: AsRef<Path>>(path: P) -> Result<u64, LedgerError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(0);
    }

    let bytes = fs::read(path).map_err(|e| {
        LedgerError::Persistence(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let keep = complete_records(&bytes).len();
    if keep == bytes.len() {
        return Ok(0);
    }

    let file = OpenOptions::new().write(true).open(path).map_err(|e| {
        LedgerError::Persistence(format!("Failed to open {}: {}", path.display(), e))
    })?;
    file.set_len(keep as u64)
        .and_then(|_| file.sync_data())
        .map_err(|e| {
            LedgerError::Persistence(format!("Failed to truncate {}: {}", path.display(), e))
        })?;

    let removed = (bytes.len() - keep) as u64;
    tracing::warn!(path = %path.display(), removed, "truncated incomplete trailing record");
    Ok(removed)
}

/// Serialize records (without header) into one buffer
fn encode_records<T: Serialize>(header: Option<&[&str]>, rows: &[T]) -> Result<Vec<u8>, LedgerError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    if let Some(header) = header {
        writer.write_record(header)?;
    }
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| LedgerError::Persistence(format!("Failed to serialize record: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| LedgerError::Persistence(format!("Failed to encode records: {}", e)))
}

/// Temp file path used for an atomic rewrite of `path`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write bytes to a file atomically (write to temp, then rename)
///
/// The file is either completely written or not modified at all.
pub fn write_bytes_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), LedgerError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            LedgerError::Persistence(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Same directory as the target, so the rename stays on one filesystem
    let temp_path = temp_path_for(path);

    let file = File::create(&temp_path)
        .map_err(|e| LedgerError::Persistence(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    writer
        .write_all(bytes)
        .map_err(|e| LedgerError::Persistence(format!("Failed to write data: {}", e)))?;

    writer
        .flush()
        .map_err(|e| LedgerError::Persistence(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| LedgerError::Persistence(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        LedgerError::Persistence(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// Rewrite a whole CSV table atomically, header first
pub fn write_csv_atomic<T, P>(path: P, header: &[&str], rows: &[T]) -> Result<(), LedgerError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let bytes = encode_records(Some(header), rows)?;
    write_bytes_atomic(path, &bytes)
}

/// Append records to a CSV table durably
///
/// The header is written only when the file is new or empty. All records go
/// out in one `write_all` and are synced before returning.
pub fn append_csv<T, P>(path: P, header: &[&str], rows: &[T]) -> Result<(), LedgerError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if rows.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            LedgerError::Persistence(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LedgerError::Persistence(format!("Failed to open {}: {}", path.display(), e))
        })?;

    let original_len = file
        .metadata()
        .map_err(|e| LedgerError::Persistence(format!("Failed to stat {}: {}", path.display(), e)))?
        .len();

    let bytes = encode_records((original_len == 0).then_some(header), rows)?;

    append_or_roll_back(&mut file, original_len, &bytes, |f, b| f.write_all(b)).map_err(|e| {
        LedgerError::Persistence(format!("Failed to append to {}: {}", path.display(), e))
    })
}

/// Write and sync `bytes`, or cut the file back to `original_len`
///
/// A failed append leaves neither a partial record for the next append to
/// glue onto nor a complete one the caller was told did not happen.
fn append_or_roll_back<F>(
    file: &mut File,
    original_len: u64,
    bytes: &[u8],
    write: F,
) -> std::io::Result<()>
where
    F: FnOnce(&mut File, &[u8]) -> std::io::Result<()>,
{
    let result = write(&mut *file, bytes).and_then(|_| file.sync_data());

    if let Err(e) = result {
        if let Err(undo) = file.set_len(original_len).and_then(|_| file.sync_data()) {
            tracing::warn!(error = %undo, "failed to cut back partial append");
        }
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
        value: i32,
    }

    const HEADER: &[&str] = &["name", "value"];

    fn row(name: &str, value: i32) -> Row {
        Row {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_read_nonexistent_returns_empty() {
        let temp_dir = TempDir::new().unwrap();
        let rows: Vec<Row> = read_csv(temp_dir.path().join("missing.csv")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("table.csv");

        let rows = vec![row("a, with comma", 1), row("b", 2)];
        write_csv_atomic(&path, HEADER, &rows).unwrap();

        let loaded: Vec<Row> = read_csv(&path).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("table.csv");

        write_csv_atomic::<Row, _>(&path, HEADER, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "name,value\n");
    }

    #[test]
    fn test_atomic_write_no_temp_file_left() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("table.csv");

        write_csv_atomic(&path, HEADER, &[row("x", 1)]).unwrap();

        assert!(path.exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("table.csv");

        write_csv_atomic(&path, HEADER, &[row("x", 1)]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_failed_rename_leaves_old_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("table.csv");
        fs::create_dir(&path).unwrap();

        let err = write_csv_atomic(&path, HEADER, &[row("x", 1)]).unwrap_err();
        assert!(err.is_persistence());
        assert!(path.is_dir());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_append_writes_header_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.csv");

        append_csv(&path, HEADER, &[row("a", 1)]).unwrap();
        append_csv(&path, HEADER, &[row("b", 2), row("c", 3)]).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "name,value\na,1\nb,2\nc,3\n");

        let loaded: Vec<Row> = read_csv(&path).unwrap();
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn test_torn_tail_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.csv");
        fs::write(&path, "name,value\na,1\nb,2\nc,").unwrap();

        let loaded: Vec<Row> = read_csv(&path).unwrap();
        assert_eq!(loaded, vec![row("a", 1), row("b", 2)]);
    }

    #[test]
    fn test_malformed_middle_record_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.csv");
        fs::write(&path, "name,value\na,not-a-number\nb,2\n").unwrap();

        let err = read_csv::<Row, _>(&path).unwrap_err();
        assert!(err.is_persistence());
    }

    #[test]
    fn test_truncate_torn_tail_allows_clean_append() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.csv");
        fs::write(&path, "name,value\na,1\nb,").unwrap();

        assert_eq!(truncate_torn_tail(&path).unwrap(), 2);
        assert_eq!(truncate_torn_tail(&path).unwrap(), 0);

        append_csv(&path, HEADER, &[row("c", 3)]).unwrap();
        let loaded: Vec<Row> = read_csv(&path).unwrap();
        assert_eq!(loaded, vec![row("a", 1), row("c", 3)]);
    }

    #[test]
    fn test_failed_append_leaves_file_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.csv");
        append_csv(&path, HEADER, &[row("a", 1)]).unwrap();
        let before = fs::read(&path).unwrap();

        // Half a record reaches the file before the write fails
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        let err = append_or_roll_back(&mut file, before.len() as u64, b"b,2\n", |f, b| {
            f.write_all(&b[..2])?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        drop(file);

        assert_eq!(fs::read(&path).unwrap(), before);

        append_csv(&path, HEADER, &[row("c", 3)]).unwrap();
        let loaded: Vec<Row> = read_csv(&path).unwrap();
        assert_eq!(loaded, vec![row("a", 1), row("c", 3)]);
    }

    #[test]
    fn test_complete_records() {
        assert_eq!(complete_records(b"h\na\nb"), b"h\na\n");
        assert_eq!(complete_records(b"h\na\n"), b"h\na\n");
        assert_eq!(complete_records(b"partial"), b"");
    }
}
