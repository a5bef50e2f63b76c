//! Wire shapes of the panel API. Each endpoint gets its own struct so a
//! missing or mistyped field fails at decode time.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    pub data: Vec<Item<T>>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Item<T> {
    pub attributes: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Meta {
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    pub total_pages: u32,
}

impl<T> ListResponse<T> {
    /// Whether pages remain after `requested`. The echoed `current_page` is
    /// not trusted, so a server that always answers page 1 cannot loop us.
    pub fn has_page_after(&self, requested: u32) -> bool {
        self.meta
            .as_ref()
            .is_some_and(|m| requested < m.pagination.total_pages)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerAttributes {
    pub identifier: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileAttributes {
    pub name: String,
    pub is_file: bool,
    #[serde(default)]
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignedUrlResponse {
    pub attributes: SignedUrl,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignedUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct DownloadRequest<'a> {
    pub file: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteRequest<'a> {
    pub root: &'a str,
    pub files: &'a [String],
}

pub(crate) fn decode<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|e| Error::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_file_listing() {
        let body = br#"{"object":"list","data":[{"object":"file_object","attributes":{
            "name":"creds.json","mode":"-rw-r--r--","size":120,"is_file":true,
            "is_symlink":false,"modified_at":"2024-05-01T10:00:00+00:00"}}]}"#;
        let list: ListResponse<FileAttributes> = decode("u", body).unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].attributes.name, "creds.json");
        assert_eq!(list.data[0].attributes.size, 120);
        assert!(!list.has_page_after(1));
    }

    #[test]
    fn test_missing_field_is_decode_error() {
        let body = br#"{"data":[{"attributes":{"name":"x"}}]}"#;
        let err = decode::<ListResponse<FileAttributes>>("http://panel/list", body).unwrap_err();
        match err {
            Error::Decode { url, .. } => assert_eq!(url, "http://panel/list"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_pagination() {
        let body = br#"{"data":[],"meta":{"pagination":{"total":60,"count":50,"per_page":50,"current_page":1,"total_pages":2}}}"#;
        let list: ListResponse<ServerAttributes> = decode("u", body).unwrap();
        assert!(list.has_page_after(1));
        assert!(!list.has_page_after(2));
    }
}
