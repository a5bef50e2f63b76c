mod client;
mod payload;
mod transport;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use client::PanelClient;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};

/// A server as listed by the panel's application API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInstance {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    /// Directory this entry was listed from, always absolute.
    pub parent_path: String,
}

/// Everything the orchestration core needs from the panel.
pub trait PanelApi: Send + Sync {
    fn list_instances(&self) -> Result<Vec<RemoteInstance>, Error>;

    /// `path` is absolute; `/` lists the instance root.
    fn list_directory(&self, instance_id: &str, path: &str) -> Result<Vec<DirectoryEntry>, Error>;

    /// `file_path` is relative to the instance root.
    fn download_file(&self, instance_id: &str, file_path: &str) -> Result<Vec<u8>, Error>;

    /// Delete `files` (relative to `root`). Succeeds only on "no content".
    fn delete_files(&self, instance_id: &str, root: &str, files: &[String]) -> Result<(), Error>;
}
