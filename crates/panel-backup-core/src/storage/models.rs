use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::panel::DirectoryEntry;

/// A target file found on a remote instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMatch {
    pub instance_id: String,
    pub instance_name: String,
    /// Path relative to the instance root, without a leading slash.
    pub file_path: String,
    /// Owning directory, always absolute.
    pub directory: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

impl FileMatch {
    pub fn new(
        instance_id: &str,
        instance_name: &str,
        directory: &str,
        entry: &DirectoryEntry,
    ) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            instance_name: instance_name.to_string(),
            file_path: relative_file_path(directory, &entry.name),
            directory: directory.to_string(),
            size: entry.size,
            modified_at: entry.modified_at,
        }
    }
}

/// `/` + `a.json` -> `a.json`, `/data/x` + `a.json` -> `data/x/a.json`.
pub fn relative_file_path(directory: &str, name: &str) -> String {
    let dir = directory.trim_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Result of one completed fleet-wide scan pass. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: String,
    pub created_at: DateTime<Utc>,
    pub matches: Vec<FileMatch>,
    pub instance_count: usize,
    pub quick_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_scans: u64,
    pub total_backups: u64,
    pub total_deletions: u64,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub last_backup_at: Option<DateTime<Utc>>,
}

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentState {
    #[serde(default)]
    pub sink_id: Option<String>,
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default)]
    pub scans: BTreeMap<String, ScanRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_file_path() {
        assert_eq!(relative_file_path("/", "creds.json"), "creds.json");
        assert_eq!(relative_file_path("/data", "creds.json"), "data/creds.json");
        assert_eq!(
            relative_file_path("/data/bot/session", "creds.json"),
            "data/bot/session/creds.json"
        );
    }

    #[test]
    fn test_state_defaults_when_fields_missing() {
        let state: PersistentState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, PersistentState::default());
    }
}
