use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::trace;

use crate::error::Error;

const PANEL_ACCEPT: &str = "Application/vnd.pterodactyl.v1+json";
const USER_AGENT: &str = concat!("panel-backup/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Panel API key. `None` for pre-signed download URLs.
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            bearer: None,
            body: None,
            timeout,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            bearer: None,
            body: Some(body),
            timeout,
        }
    }

    pub fn bearer(mut self, key: &str) -> Self {
        self.bearer = Some(key.to_string());
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP exchange. Non-2xx statuses are returned as responses, not errors;
/// `Err` is reserved for failures below HTTP (timeouts, refused connections).
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, Error>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, Error> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        builder = builder.timeout(request.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(key) = &request.bearer {
            builder = builder.bearer_auth(key).header(ACCEPT, PANEL_ACCEPT);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        trace!("{:?} {} -> {} ({} bytes)", request.method, request.url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}
