use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::Error;
use crate::panel::PanelApi;
use crate::progress::{BackupProgress, ProgressReporter};
use crate::sink::{sanitize_file_name, Artifact, ArtifactMetadata, NotificationSink};
use crate::storage::{FileMatch, ScanStore};

#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub prefix: String,
    pub extension: String,
    pub auto_delete: bool,
}

impl From<&AppConfig> for BackupSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            prefix: config.backup_prefix.clone(),
            extension: config.artifact_extension().to_string(),
            auto_delete: config.auto_delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedDirectory {
    pub instance_id: String,
    pub instance_name: String,
    pub directory: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupResult {
    /// Matches processed.
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
    /// Delete requests that failed. Their backups still count as successes.
    pub delete_error_count: usize,
    /// Unique directories erased in this run, in deletion order.
    pub deleted_directories: Vec<DeletedDirectory>,
    pub auto_delete: bool,
}

impl BackupResult {
    pub fn deleted_count(&self) -> usize {
        self.deleted_directories.len()
    }

    fn already_deleted(&self, m: &FileMatch) -> bool {
        self.deleted_directories
            .iter()
            .any(|d| d.instance_id == m.instance_id && d.directory == m.directory)
    }
}

/// `{prefix}_{instance}_{YYYYmmdd_HHMMSS}.{ext}`, file-name safe.
pub fn artifact_name(
    prefix: &str,
    instance_name: &str,
    at: DateTime<Utc>,
    extension: &str,
) -> String {
    sanitize_file_name(&format!(
        "{}_{}_{}.{}",
        prefix,
        instance_name,
        at.format("%Y%m%d_%H%M%S"),
        extension
    ))
}

/// Download → deliver → erase, per match. Item failures are counted, never fatal.
pub struct BackupPipeline {
    api: Arc<dyn PanelApi>,
    store: Arc<ScanStore>,
    sink: Arc<dyn NotificationSink>,
    settings: BackupSettings,
}

impl BackupPipeline {
    pub fn new(
        api: Arc<dyn PanelApi>,
        store: Arc<ScanStore>,
        sink: Arc<dyn NotificationSink>,
        settings: BackupSettings,
    ) -> Self {
        Self {
            api,
            store,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    /// Only persisting the statistics at the end can fail the whole run.
    pub fn run_backup(
        &self,
        matches: &[FileMatch],
        reporter: &dyn ProgressReporter,
    ) -> Result<BackupResult, Error> {
        info!("Starting backup of {} files...", matches.len());
        let backup_start = Instant::now();
        reporter.on_backup_start(matches.len());

        let mut result = BackupResult {
            total: matches.len(),
            auto_delete: self.settings.auto_delete,
            ..BackupResult::default()
        };

        for (i, m) in matches.iter().enumerate() {
            let progress = BackupProgress {
                index: i + 1,
                total: matches.len(),
                instance_name: &m.instance_name,
                file_path: &m.file_path,
            };
            reporter.on_backup_progress(&progress);
            self.sink.report_progress(&progress.to_string());

            let content = match self.api.download_file(&m.instance_id, &m.file_path) {
                Ok(content) => content,
                Err(err) => {
                    error!("Failed to download {} from {}: {}", m.file_path, m.instance_name, err);
                    result.error_count += 1;
                    continue;
                }
            };

            let delivered_at = Utc::now();
            let artifact = Artifact {
                name: artifact_name(
                    &self.settings.prefix,
                    &m.instance_name,
                    delivered_at,
                    &self.settings.extension,
                ),
                metadata: ArtifactMetadata {
                    instance_id: m.instance_id.clone(),
                    instance_name: m.instance_name.clone(),
                    original_path: m.file_path.clone(),
                    delivered_at,
                    size_bytes: content.len() as u64,
                },
                content,
            };
            if let Err(err) = self.sink.deliver_artifact(&artifact) {
                error!("Error backing up {}: {}", m.file_path, err);
                result.error_count += 1;
                continue;
            }

            if self.settings.auto_delete && !result.already_deleted(m) {
                self.erase_directory(m, &mut result);
            }

            result.success_count += 1;
        }

        self.store.record_backup(
            result.success_count as u64,
            result.deleted_count() as u64,
            Utc::now(),
        )?;
        self.sink.report_final_summary(&result);

        let duration = backup_start.elapsed();
        info!(
            "Backup completed in {:.2}s: {} succeeded, {} failed, {} directories deleted, {} deletes failed",
            duration.as_secs_f64(),
            result.success_count,
            result.error_count,
            result.deleted_count(),
            result.delete_error_count,
        );
        reporter.on_backup_complete(&result, duration.as_secs_f64());

        Ok(result)
    }

    fn erase_directory(&self, m: &FileMatch, result: &mut BackupResult) {
        let relative = m.directory.trim_matches('/');
        if relative.is_empty() {
            warn!(
                "Not deleting the root directory of {}; only subdirectories are erased",
                m.instance_name
            );
            return;
        }

        let files = [relative.to_string()];
        match self.api.delete_files(&m.instance_id, "/", &files) {
            Ok(()) => {
                info!("Deleted {} on {}", m.directory, m.instance_name);
                result.deleted_directories.push(DeletedDirectory {
                    instance_id: m.instance_id.clone(),
                    instance_name: m.instance_name.clone(),
                    directory: m.directory.clone(),
                });
            }
            Err(err) => {
                warn!(
                    "Failed to delete {} on {}: {}",
                    m.directory, m.instance_name, err
                );
                result.delete_error_count += 1;
            }
        }
    }
}
