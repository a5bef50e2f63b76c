use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

use panel_backup_core::progress::{BackupProgress, ScanProgress};
use panel_backup_core::{BackupResult, ProgressReporter, ScanRecord};

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// One bar per run: servers for a scan, files for a backup.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn start_bar(&self, total: usize, label: &str) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template(&format!(
                "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} {{msg}}",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICKS),
        );
        pb.enable_steady_tick(Duration::from_millis(80));

        let mut guard = self.bar.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(old) = guard.replace(pb) {
            old.finish_and_clear();
        }
    }

    fn update(&self, position: usize, message: String) {
        let guard = self.bar.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(pb) = guard.as_ref() {
            pb.set_position(position as u64);
            pb.set_message(message);
        }
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, instances: usize) {
        self.start_bar(instances, "Scanning");
    }

    fn on_instance_progress(&self, progress: &ScanProgress<'_>) {
        self.update(
            progress.index - 1,
            format!(
                "{} ({} found so far)",
                progress.instance_name, progress.matches_so_far
            ),
        );
    }

    fn on_scan_complete(&self, record: &ScanRecord, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Scan {} complete: {} files on {} servers in {:.2}s",
            style("✓").green(),
            record.scan_id,
            record.matches.len(),
            record.instance_count,
            duration_secs
        );
    }

    fn on_backup_start(&self, matches: usize) {
        self.start_bar(matches, "Backing up");
    }

    fn on_backup_progress(&self, progress: &BackupProgress<'_>) {
        self.update(
            progress.index - 1,
            format!("{}: {}", progress.instance_name, progress.file_path),
        );
    }

    fn on_backup_complete(&self, result: &BackupResult, duration_secs: f64) {
        self.finish_bar();
        let mark = if result.error_count == 0 && result.delete_error_count == 0 {
            style("✓").green()
        } else {
            style("!").yellow()
        };
        eprintln!(
            "  {} Backup complete: {} succeeded, {} failed in {:.2}s",
            mark, result.success_count, result.error_count, duration_secs
        );
        if result.delete_error_count > 0 {
            eprintln!(
                "  {} {} directory deletions failed",
                style("!").yellow(),
                result.delete_error_count
            );
        }
    }
}
