use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned status {status} for {url}")]
    RemoteStatus { status: u16, url: String },

    #[error("Malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("Gave up on {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("No instances returned by the panel")]
    NoInstances,

    #[error("Scan '{0}' not found")]
    ScanNotFound(String),

    #[error("A run is already in progress for {0}")]
    RunInProgress(String),

    #[error("Notification sink is not configured")]
    SinkNotConfigured,

    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("User {0} is not allowed to use this service")]
    Unauthorized(i64),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Failures worth retrying: 5xx statuses and timeouts / connection drops.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RemoteStatus { status, .. } => (500..600).contains(status),
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
