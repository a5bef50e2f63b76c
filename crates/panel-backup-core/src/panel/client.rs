use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::payload::{
    decode, DeleteRequest, DownloadRequest, FileAttributes, ListResponse, ServerAttributes,
    SignedUrlResponse,
};
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use super::{DirectoryEntry, PanelApi, RemoteInstance};
use crate::config::AppConfig;
use crate::error::Error;

/// HTTP status the panel answers a successful delete with.
const NO_CONTENT: u16 = 204;

pub struct PanelClient<T = ReqwestTransport> {
    transport: T,
    base_url: String,
    application_key: String,
    client_key: String,
    scan_timeout: Duration,
    request_timeout: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl PanelClient<ReqwestTransport> {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self::with_transport(config, ReqwestTransport::new()?))
    }
}

impl<T: Transport> PanelClient<T> {
    pub fn with_transport(config: &AppConfig, transport: T) -> Self {
        Self {
            transport,
            base_url: config.panel_url.trim_end_matches('/').to_string(),
            application_key: config.application_api_key.clone(),
            client_key: config.client_api_key.clone(),
            scan_timeout: config.scan_timeout(),
            request_timeout: config.request_timeout(),
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: config.retry_delay(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn files_url(&self, instance_id: &str, action: &str) -> String {
        format!(
            "{}/api/client/servers/{}/files/{}",
            self.base_url, instance_id, action
        )
    }

    /// Send once; anything but a 2xx becomes [`Error::RemoteStatus`].
    fn send_ok(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let response = self.transport.send(request)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(Error::RemoteStatus {
                status: response.status,
                url: request.url.clone(),
            })
        }
    }

    /// Fixed-delay retry on transient failures, at most `retry_attempts` sends.
    fn send_with_retry(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let attempts = self.retry_attempts;
        for attempt in 1..=attempts {
            debug!("GET {} (attempt {}/{})", request.url, attempt, attempts);
            match self.send_ok(request) {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() => {
                    warn!("{} (attempt {}/{})", err, attempt, attempts);
                    if attempt < attempts {
                        info!("Retrying in {:?}...", self.retry_delay);
                        thread::sleep(self.retry_delay);
                    }
                }
                Err(err) => {
                    error!("{}", err);
                    return Err(err);
                }
            }
        }

        Err(Error::RetriesExhausted {
            url: request.url.clone(),
            attempts,
        })
    }
}

impl<T: Transport> PanelApi for PanelClient<T> {
    fn list_instances(&self) -> Result<Vec<RemoteInstance>, Error> {
        let url = format!("{}/api/application/servers", self.base_url);
        let mut instances = Vec::new();
        let mut page = 1u32;

        loop {
            let request = HttpRequest::get(&url, self.request_timeout)
                .bearer(&self.application_key)
                .query("page", &page.to_string());
            let response = self.send_ok(&request)?;
            let list: ListResponse<ServerAttributes> = decode(&url, &response.body)?;
            let has_next = list.has_page_after(page);

            instances.extend(list.data.into_iter().map(|item| RemoteInstance {
                id: item.attributes.identifier,
                name: item.attributes.name,
            }));

            if !has_next {
                break;
            }
            page += 1;
        }

        debug!("Panel reported {} instances", instances.len());
        Ok(instances)
    }

    fn list_directory(&self, instance_id: &str, path: &str) -> Result<Vec<DirectoryEntry>, Error> {
        let url = self.files_url(instance_id, "list");
        let mut request = HttpRequest::get(&url, self.scan_timeout).bearer(&self.client_key);
        if path != "/" {
            request = request.query("directory", path);
        }

        let response = self.send_with_retry(&request)?;
        let list: ListResponse<FileAttributes> = decode(&url, &response.body)?;

        Ok(list
            .data
            .into_iter()
            .map(|item| DirectoryEntry {
                name: item.attributes.name,
                is_directory: !item.attributes.is_file,
                size: item.attributes.size,
                modified_at: item.attributes.modified_at,
                parent_path: path.to_string(),
            })
            .collect())
    }

    fn download_file(&self, instance_id: &str, file_path: &str) -> Result<Vec<u8>, Error> {
        let url = self.files_url(instance_id, "download");
        let body = serde_json::to_value(DownloadRequest { file: file_path })?;
        let request = HttpRequest::post(&url, body, self.request_timeout).bearer(&self.client_key);
        let response = self.send_ok(&request)?;
        let signed: SignedUrlResponse = decode(&url, &response.body)?;

        let fetch = HttpRequest::get(signed.attributes.url, self.request_timeout);
        let content = self.send_ok(&fetch)?;
        debug!(
            "Downloaded {} from {} ({} bytes)",
            file_path,
            instance_id,
            content.body.len()
        );
        Ok(content.body)
    }

    fn delete_files(&self, instance_id: &str, root: &str, files: &[String]) -> Result<(), Error> {
        let url = self.files_url(instance_id, "delete");
        let body = serde_json::to_value(DeleteRequest { root, files })?;
        let request = HttpRequest::post(&url, body, self.request_timeout).bearer(&self.client_key);
        let response = self.transport.send(&request)?;

        if response.status == NO_CONTENT {
            debug!("Deleted {:?} under {} on {}", files, root, instance_id);
            Ok(())
        } else {
            Err(Error::RemoteStatus {
                status: response.status,
                url,
            })
        }
    }
}
