#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Barrier, Mutex};

use panel_backup_core::error::Error;
use panel_backup_core::panel::{DirectoryEntry, PanelApi, RemoteInstance};
use panel_backup_core::{AppConfig, BackupService, LocalDirSink, ScanStore};

/// In-memory panel: a file tree per instance plus a log of delete calls.
#[derive(Default)]
pub struct FakePanel {
    instances: Vec<RemoteInstance>,
    /// (instance, absolute dir) -> listing
    tree: HashMap<(String, String), Vec<DirectoryEntry>>,
    /// (instance, relative path) -> content
    files: HashMap<(String, String), Vec<u8>>,
    broken_downloads: HashSet<String>,
    failing_deletes: bool,
    pub deletes: Mutex<Vec<(String, String, Vec<String>)>>,
    pub downloads: Mutex<Vec<String>>,
    /// `(entered, release)`: download blocks between the two waits.
    gate: Option<(Barrier, Barrier)>,
}

impl FakePanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance(mut self, id: &str, name: &str) -> Self {
        self.instances.push(RemoteInstance {
            id: id.to_string(),
            name: name.to_string(),
        });
        self.tree
            .entry((id.to_string(), "/".to_string()))
            .or_default();
        self
    }

    /// Listed by the panel, but its root cannot be read.
    pub fn unreachable_instance(mut self, id: &str, name: &str) -> Self {
        self.instances.push(RemoteInstance {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    fn push(&mut self, id: &str, dir: &str, name: &str, is_directory: bool, size: u64) {
        let entry = DirectoryEntry {
            name: name.to_string(),
            is_directory,
            size,
            modified_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            parent_path: dir.to_string(),
        };
        self.tree
            .entry((id.to_string(), dir.to_string()))
            .or_default()
            .push(entry);
    }

    pub fn file(mut self, id: &str, dir: &str, name: &str, content: &[u8]) -> Self {
        self.push(id, dir, name, false, content.len() as u64);
        let relative = match dir.trim_matches('/') {
            "" => name.to_string(),
            d => format!("{}/{}", d, name),
        };
        self.files
            .insert((id.to_string(), relative), content.to_vec());
        self
    }

    pub fn dir(mut self, id: &str, parent: &str, name: &str) -> Self {
        self.push(id, parent, name, true, 0);
        let path = match parent.trim_end_matches('/') {
            "" => format!("/{}", name),
            p => format!("{}/{}", p, name),
        };
        self.tree.entry((id.to_string(), path)).or_default();
        self
    }

    pub fn broken_download(mut self, file_path: &str) -> Self {
        self.broken_downloads.insert(file_path.to_string());
        self
    }

    /// Delete calls are still recorded, then answered with a 500.
    pub fn failing_deletes(mut self) -> Self {
        self.failing_deletes = true;
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some((Barrier::new(2), Barrier::new(2)));
        self
    }

    pub fn wait_until_downloading(&self) {
        if let Some((entered, _)) = &self.gate {
            entered.wait();
        }
    }

    pub fn release_download(&self) {
        if let Some((_, release)) = &self.gate {
            release.wait();
        }
    }

    pub fn deleted_dirs(&self) -> Vec<String> {
        self.deletes
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, _, files)| files.clone())
            .collect()
    }
}

impl PanelApi for FakePanel {
    fn list_instances(&self) -> Result<Vec<RemoteInstance>, Error> {
        Ok(self.instances.clone())
    }

    fn list_directory(&self, instance_id: &str, path: &str) -> Result<Vec<DirectoryEntry>, Error> {
        self.tree
            .get(&(instance_id.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| Error::RemoteStatus {
                status: 404,
                url: path.to_string(),
            })
    }

    fn download_file(&self, instance_id: &str, file_path: &str) -> Result<Vec<u8>, Error> {
        self.wait_until_downloading();
        self.release_download();
        self.downloads.lock().unwrap().push(file_path.to_string());
        if self.broken_downloads.contains(file_path) {
            return Err(Error::RetriesExhausted {
                url: file_path.to_string(),
                attempts: 3,
            });
        }
        self.files
            .get(&(instance_id.to_string(), file_path.to_string()))
            .cloned()
            .ok_or_else(|| Error::RemoteStatus {
                status: 404,
                url: file_path.to_string(),
            })
    }

    fn delete_files(&self, instance_id: &str, root: &str, files: &[String]) -> Result<(), Error> {
        self.deletes.lock().unwrap().push((
            instance_id.to_string(),
            root.to_string(),
            files.to_vec(),
        ));
        if self.failing_deletes {
            return Err(Error::RemoteStatus {
                status: 500,
                url: root.to_string(),
            });
        }
        Ok(())
    }
}

pub fn test_config(state_dir: &Path) -> AppConfig {
    let mut config = AppConfig::new("https://panel.example.com", "app-key", "client-key");
    config.retry_delay_secs = 0;
    config.state_path = state_dir.join("bot_data.json");
    config.outbox_dir = state_dir.join("backups");
    config
}

pub fn service_with(
    config: AppConfig,
    panel: Arc<FakePanel>,
) -> (BackupService, Arc<ScanStore>) {
    let store = Arc::new(ScanStore::open(&config.state_path).unwrap());
    let sink = Arc::new(LocalDirSink::new(&config.outbox_dir));
    let service = BackupService::new(config, panel, store.clone(), sink).unwrap();
    (service, store)
}

/// srv1 has `creds.json` at the root and in `/data`.
pub fn creds_fleet() -> FakePanel {
    FakePanel::new()
        .instance("a1b2c3d4", "srv1")
        .file("a1b2c3d4", "/", "creds.json", &[b'x'; 120])
        .dir("a1b2c3d4", "/", "data")
        .file("a1b2c3d4", "/data", "creds.json", &[b'y'; 80])
}
