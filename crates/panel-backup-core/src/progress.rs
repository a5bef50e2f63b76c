use std::fmt;

use crate::backup::BackupResult;
use crate::storage::ScanRecord;

/// Emitted before each instance is scanned.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress<'a> {
    /// 1-based.
    pub index: usize,
    pub total: usize,
    pub instance_name: &'a str,
    /// Matches accumulated from the instances already scanned.
    pub matches_so_far: usize,
}

impl ScanProgress<'_> {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.index as f64 / self.total as f64 * 100.0
    }
}

impl fmt::Display for ScanProgress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scanning server {}/{}: {}\nProgress: {:.1}%\nFound files: {}",
            self.index,
            self.total,
            self.instance_name,
            self.percent(),
            self.matches_so_far
        )
    }
}

/// Emitted before each match is downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupProgress<'a> {
    /// 1-based.
    pub index: usize,
    pub total: usize,
    pub instance_name: &'a str,
    pub file_path: &'a str,
}

impl fmt::Display for BackupProgress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Backing up file {}/{}\nServer: {}\nFile: {}",
            self.index, self.total, self.instance_name, self.file_path
        )
    }
}

/// Trait for reporting scan and backup progress.
///
/// CLI implements with indicatif; front-ends forward to their own channel.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _instances: usize) {}
    fn on_instance_progress(&self, _progress: &ScanProgress<'_>) {}
    fn on_scan_complete(&self, _record: &ScanRecord, _duration_secs: f64) {}
    fn on_backup_start(&self, _matches: usize) {}
    fn on_backup_progress(&self, _progress: &BackupProgress<'_>) {}
    fn on_backup_complete(&self, _result: &BackupResult, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
