use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::backup::BackupResult;
use crate::config::AppConfig;
use crate::storage::{ScanRecord, Statistics};

const SCAN_PREVIEW: usize = 10;
const CONFIRM_PREVIEW: usize = 5;

pub const HELP_TEXT: &str = "\
Usage

Actions:
  setup_sink:<id>      deliver backups to sink <id>
  quick_scan / scan    scan every server for the target file
  start_backup         review the latest scan before backing it up
  confirm_backup_<id>  back up scan <id>
  cancel_backup        abandon a pending backup
  status / stats       show configuration and counters
  clean                drop cached scan results

Workflow:
  1. Configure the sink
  2. Run a scan
  3. Review the results
  4. Back up the files found
  5. Confirm directory deletion

Warning: with auto-delete enabled the directory holding each file is
deleted after its backup is delivered.";

fn when(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Never".to_string())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "Enabled"
    } else {
        "Disabled"
    }
}

pub fn scan_summary(record: &ScanRecord, target_filename: &str) -> String {
    if record.matches.is_empty() {
        return format!(
            "No {} files found in any of {} servers.",
            target_filename, record.instance_count
        );
    }

    let mut text = format!(
        "Scan {} completed!\n\nFound {} files:\n\n",
        record.scan_id,
        record.matches.len()
    );
    for (i, m) in record.matches.iter().take(SCAN_PREVIEW).enumerate() {
        let _ = writeln!(
            text,
            "{}. {}\n   Path: {}\n   Size: {} bytes\n",
            i + 1,
            m.instance_name,
            m.file_path,
            m.size
        );
    }
    if record.matches.len() > SCAN_PREVIEW {
        let _ = writeln!(
            text,
            "... and {} more files",
            record.matches.len() - SCAN_PREVIEW
        );
    }
    text.trim_end().to_string()
}

pub fn backup_confirmation(record: &ScanRecord, auto_delete: bool) -> String {
    let mut text = format!(
        "BACKUP CONFIRMATION\n\nScan {}:\n  Files found: {}\n  Auto-delete directories: {}\n\nFiles to back up:\n",
        record.scan_id,
        record.matches.len(),
        enabled(auto_delete)
    );
    for (i, m) in record.matches.iter().take(CONFIRM_PREVIEW).enumerate() {
        let _ = writeln!(text, "{}. {}: {}", i + 1, m.instance_name, m.file_path);
    }
    if record.matches.len() > CONFIRM_PREVIEW {
        let _ = writeln!(
            text,
            "... and {} other files",
            record.matches.len() - CONFIRM_PREVIEW
        );
    }
    if auto_delete {
        text.push_str("\nWARNING: directories will be deleted after backup!\n");
    }
    text.push_str("\nAre you sure you want to continue?");
    text
}

pub fn backup_summary(result: &BackupResult) -> String {
    let mut text = format!(
        "Backup process complete!\n\n\
         Successfully backed up: {} files\n\
         Errors: {} files\n\
         Total processed: {} files\n\n\
         Directories deleted: {} ({})",
        result.success_count,
        result.error_count,
        result.total,
        result.deleted_count(),
        if result.auto_delete {
            "auto-delete enabled"
        } else {
            "auto-delete disabled"
        }
    );
    if result.delete_error_count > 0 {
        let _ = write!(
            text,
            "\nFailed deletions: {} (backups were kept)",
            result.delete_error_count
        );
    }
    text
}

pub fn status_report(config: &AppConfig, sink_id: Option<&str>, stats: &Statistics) -> String {
    format!(
        "Backup service status\n\n\
         Configuration:\n\
         \x20 Panel: {}\n\
         \x20 Target file: {}\n\
         \x20 Auto delete: {}\n\
         \x20 Scan subdirectories: {}\n\n\
         Sink: {}\n\n\
         Statistics:\n\
         \x20 Total scans: {}\n\
         \x20 Total backups: {}\n\
         \x20 Total deletions: {}\n\
         \x20 Last scan: {}\n\n\
         State: {}",
        config.panel_url,
        config.target_filename,
        enabled(config.auto_delete),
        enabled(config.scan_subdirectories),
        sink_id.unwrap_or("not configured"),
        stats.total_scans,
        stats.total_backups,
        stats.total_deletions,
        when(stats.last_scan_at),
        if sink_id.is_some() { "Ready" } else { "Needs setup" }
    )
}

pub fn statistics_report(config: &AppConfig, stats: &Statistics, cached_scans: usize) -> String {
    format!(
        "Detailed statistics\n\n\
         Usage:\n\
         \x20 Total scans performed: {}\n\
         \x20 Total files backed up: {}\n\
         \x20 Total directories deleted: {}\n\n\
         Timeline:\n\
         \x20 Last scan: {}\n\
         \x20 Last backup: {}\n\n\
         Scan history:\n\
         \x20 Cached scan results: {}\n\n\
         Configuration:\n\
         \x20 Target filename: {}\n\
         \x20 Auto delete: {}\n\
         \x20 Subdirectory scan: {}\n\
         \x20 Max scan depth: {}\n\
         \x20 Retry attempts: {}",
        stats.total_scans,
        stats.total_backups,
        stats.total_deletions,
        when(stats.last_scan_at),
        when(stats.last_backup_at),
        cached_scans,
        config.target_filename,
        enabled(config.auto_delete),
        enabled(config.scan_subdirectories),
        config.max_scan_depth,
        config.retry_attempts
    )
}

pub fn cache_cleared(count: usize) -> String {
    format!("Cache cleared!\n\nCleared {} cached scan results", count)
}
