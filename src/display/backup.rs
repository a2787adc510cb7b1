//! Backup and audit log display formatting

use crate::audit::AuditEntry;
use crate::backup::BackupSet;

/// Format backup sets, newest first
pub fn format_backup_list(sets: &[BackupSet]) -> String {
    if sets.is_empty() {
        return "No backups found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<19}  {:>5}  {:>10}\n",
        "Created", "Files", "Size"
    ));
    output.push_str(&"-".repeat(38));
    output.push('\n');

    for set in sets {
        output.push_str(&format!(
            "{:<19}  {:>5}  {:>10}\n",
            set.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            set.files.len(),
            format_size(set.size_bytes()),
        ));
    }

    output
}

/// Format audit entries one per line, as they appear in the log
pub fn format_audit_entries(entries: &[AuditEntry]) -> String {
    if entries.is_empty() {
        return "No audit entries.\n".to_string();
    }

    let mut output = String::new();
    for entry in entries {
        output.push_str(&entry.format_line());
        output.push('\n');
    }
    output
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAction, AuditLevel};
    use chrono::NaiveDate;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_backup_list() {
        let set = BackupSet {
            stamp: "20240301_093005".into(),
            created_at: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 5)
                .unwrap(),
            files: Vec::new(),
        };

        let output = format_backup_list(&[set]);
        assert!(output.contains("2024-03-01 09:30:05"));
        assert!(output.contains("0 B"));
        assert_eq!(format_backup_list(&[]), "No backups found.\n");
    }

    #[test]
    fn test_format_audit_entries() {
        let entry = AuditEntry::new(AuditLevel::Info, AuditAction::Backup, None, None);
        let output = format_audit_entries(&[entry.clone(), entry]);
        assert_eq!(output.lines().count(), 2);
        assert!(output.contains("ACTION=BACKUP"));
    }
}
