use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

use crate::backup::BackupResult;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMetadata {
    pub instance_id: String,
    pub instance_name: String,
    pub original_path: String,
    pub delivered_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// A downloaded file on its way to the sink.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub content: Vec<u8>,
    pub metadata: ArtifactMetadata,
}

impl Artifact {
    pub fn caption(&self) -> String {
        format!(
            "Backup Complete\n\nServer: {}\nOriginal Path: {}\nBackup Date: {}\nFile Size: {} bytes",
            self.metadata.instance_name,
            self.metadata.original_path,
            self.metadata.delivered_at.format("%Y-%m-%d %H:%M:%S"),
            self.metadata.size_bytes
        )
    }
}

/// The channel backups and progress are delivered to.
pub trait NotificationSink: Send + Sync {
    fn configure(&self, sink_id: &str) -> Result<(), Error>;

    fn is_configured(&self) -> bool;

    fn report_progress(&self, _text: &str) {}

    fn deliver_artifact(&self, artifact: &Artifact) -> Result<(), Error>;

    fn report_final_summary(&self, _result: &BackupResult) {}
}

/// Writes each artifact plus a `.meta.json` side-car under `<root>/<sink_id>/`.
pub struct LocalDirSink {
    root: PathBuf,
    target: RwLock<Option<PathBuf>>,
}

impl LocalDirSink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            target: RwLock::new(None),
        }
    }

    pub fn target_dir(&self) -> Option<PathBuf> {
        self.target
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl NotificationSink for LocalDirSink {
    fn configure(&self, sink_id: &str) -> Result<(), Error> {
        let dir = self.root.join(sanitize_file_name(sink_id));
        fs::create_dir_all(&dir)?;
        debug!("Sink {} writes to {}", sink_id, dir.display());
        *self
            .target
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(dir);
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.target_dir().is_some()
    }

    fn report_progress(&self, text: &str) {
        info!("{}", text.replace('\n', " | "));
    }

    fn deliver_artifact(&self, artifact: &Artifact) -> Result<(), Error> {
        let dir = self.target_dir().ok_or(Error::SinkNotConfigured)?;
        let (mut file, name) = create_unique(&dir, &sanitize_file_name(&artifact.name))?;
        file.write_all(&artifact.content)?;
        file.sync_all()?;

        let side_car = serde_json::json!({
            "metadata": artifact.metadata,
            "caption": artifact.caption(),
        });
        fs::write(
            dir.join(format!("{}.meta.json", name)),
            serde_json::to_vec_pretty(&side_car)?,
        )?;
        info!("Delivered {} ({} bytes)", name, artifact.content.len());
        Ok(())
    }

    fn report_final_summary(&self, result: &BackupResult) {
        info!(
            "Backup finished: {} succeeded, {} failed, {} processed, {} directories deleted, {} deletes failed",
            result.success_count,
            result.error_count,
            result.total,
            result.deleted_count(),
            result.delete_error_count
        );
    }
}

/// Create `name` in `dir` without replacing an existing file. A taken name
/// gets a `_NNN` suffix before its extension; the name used is returned.
fn create_unique(dir: &Path, name: &str) -> Result<(File, String), Error> {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    let mut candidate = name.to_string();
    let mut seq = 0u32;
    loop {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&candidate))
        {
            Ok(file) => return Ok((file, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                seq += 1;
                candidate = match ext {
                    Some(ext) => format!("{}_{:03}.{}", stem, seq, ext),
                    None => format!("{}_{:03}", stem, seq),
                };
                debug!("{} exists, trying {}", name, candidate);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Keep `[A-Za-z0-9._-]`, replace everything else with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn artifact() -> Artifact {
        Artifact {
            name: "creds_backup_srv1_20240501_120000.json".to_string(),
            content: b"{\"k\":1}".to_vec(),
            metadata: ArtifactMetadata {
                instance_id: "a1b2c3d4".to_string(),
                instance_name: "srv1".to_string(),
                original_path: "data/creds.json".to_string(),
                delivered_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                size_bytes: 7,
            },
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("My Server #1"), "My_Server__1");
        assert_eq!(sanitize_file_name("-100123"), "-100123");
        assert_eq!(sanitize_file_name(".."), "_");
        assert_eq!(sanitize_file_name("a/../b"), "a_.._b");
    }

    #[test]
    fn test_unconfigured_sink_rejects_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalDirSink::new(dir.path());
        assert!(!sink.is_configured());
        assert!(matches!(
            sink.deliver_artifact(&artifact()),
            Err(Error::SinkNotConfigured)
        ));
    }

    #[test]
    fn test_delivery_writes_artifact_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalDirSink::new(dir.path());
        sink.configure("-100123").unwrap();
        sink.deliver_artifact(&artifact()).unwrap();

        let target = dir.path().join("-100123");
        let content = fs::read(target.join("creds_backup_srv1_20240501_120000.json")).unwrap();
        assert_eq!(content, b"{\"k\":1}");

        let meta: serde_json::Value = serde_json::from_slice(
            &fs::read(target.join("creds_backup_srv1_20240501_120000.json.meta.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(meta["metadata"]["original_path"], "data/creds.json");
        assert_eq!(meta["metadata"]["size_bytes"], 7);
    }

    #[test]
    fn test_same_name_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalDirSink::new(dir.path());
        sink.configure("ops").unwrap();

        let first = artifact();
        let mut second = artifact();
        second.content = b"{\"k\":2}".to_vec();
        sink.deliver_artifact(&first).unwrap();
        sink.deliver_artifact(&second).unwrap();

        let target = dir.path().join("ops");
        assert_eq!(
            fs::read(target.join("creds_backup_srv1_20240501_120000.json")).unwrap(),
            b"{\"k\":1}"
        );
        assert_eq!(
            fs::read(target.join("creds_backup_srv1_20240501_120000_001.json")).unwrap(),
            b"{\"k\":2}"
        );
        assert!(target
            .join("creds_backup_srv1_20240501_120000_001.json.meta.json")
            .exists());
    }

    #[test]
    fn test_caption() {
        let caption = artifact().caption();
        assert!(caption.contains("Server: srv1"));
        assert!(caption.contains("Backup Date: 2024-05-01 12:00:00"));
        assert!(caption.contains("File Size: 7 bytes"));
    }
}
