use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::Error;
use crate::panel::{DirectoryEntry, PanelApi};
use crate::storage::FileMatch;

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub target_filename: String,
    pub scan_subdirectories: bool,
    /// Deepest subdirectory level listed. First-level subdirectories are depth 1.
    pub max_depth: u32,
}

impl From<&AppConfig> for ScanSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            target_filename: config.target_filename.clone(),
            scan_subdirectories: config.scan_subdirectories,
            max_depth: config.max_scan_depth,
        }
    }
}

/// Depth-bounded walk of one instance's file tree. Entries are visited in the
/// order the panel lists them, which fixes the order of the returned matches.
pub struct InstanceScanner<'a> {
    api: &'a dyn PanelApi,
    settings: &'a ScanSettings,
}

impl<'a> InstanceScanner<'a> {
    pub fn new(api: &'a dyn PanelApi, settings: &'a ScanSettings) -> Self {
        Self { api, settings }
    }

    /// Fails only if the root itself cannot be listed. Unreadable
    /// subdirectories are logged and skipped.
    pub fn scan_instance(
        &self,
        instance_id: &str,
        instance_name: &str,
    ) -> Result<Vec<FileMatch>, Error> {
        let root = self.api.list_directory(instance_id, "/")?;
        let mut found = Vec::new();
        self.collect_matches(instance_id, instance_name, "/", &root, &mut found);

        if self.settings.scan_subdirectories {
            self.walk(instance_id, instance_name, "/", &root, 1, &mut found);
        }

        debug!(
            "Instance {} ({}): {} matches",
            instance_name,
            instance_id,
            found.len()
        );
        Ok(found)
    }

    fn walk(
        &self,
        instance_id: &str,
        instance_name: &str,
        dir: &str,
        entries: &[DirectoryEntry],
        depth: u32,
        found: &mut Vec<FileMatch>,
    ) {
        if depth > self.settings.max_depth {
            return;
        }

        for entry in entries.iter().filter(|e| e.is_directory) {
            let path = join_path(dir, &entry.name);
            let children = match self.api.list_directory(instance_id, &path) {
                Ok(children) => children,
                Err(err) => {
                    warn!(
                        "Error scanning subdirectory {} on {}: {}",
                        path, instance_name, err
                    );
                    continue;
                }
            };

            self.collect_matches(instance_id, instance_name, &path, &children, found);
            self.walk(instance_id, instance_name, &path, &children, depth + 1, found);
        }
    }

    fn collect_matches(
        &self,
        instance_id: &str,
        instance_name: &str,
        dir: &str,
        entries: &[DirectoryEntry],
        found: &mut Vec<FileMatch>,
    ) {
        found.extend(
            entries
                .iter()
                .filter(|e| !e.is_directory && e.name == self.settings.target_filename)
                .map(|e| FileMatch::new(instance_id, instance_name, dir, e)),
        );
    }
}

/// Absolute child path: `/` + `data` -> `/data`, `/data` + `bot` -> `/data/bot`.
pub fn join_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}
