use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_CONFIG_NAME: &str = "Config";
pub const ENV_PREFIX: &str = "PANEL";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub panel_url: String,
    pub application_api_key: String,
    pub client_api_key: String,

    #[serde(default = "default_target_filename")]
    pub target_filename: String,
    #[serde(default = "default_true")]
    pub auto_delete: bool,
    #[serde(default = "default_backup_prefix")]
    pub backup_prefix: String,

    #[serde(default = "default_true")]
    pub scan_subdirectories: bool,
    #[serde(default = "default_max_scan_depth")]
    pub max_scan_depth: u32,
    #[serde(default = "default_timeout_secs")]
    pub scan_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,
    /// Empty means everyone may use the service.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

fn default_target_filename() -> String {
    "creds.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_backup_prefix() -> String {
    "creds_backup".to_string()
}

fn default_max_scan_depth() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_state_path() -> PathBuf {
    PathBuf::from("bot_data.json")
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("backups")
}

/// Load `Config.toml` (optional) overlaid with `PANEL_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from(DEFAULT_CONFIG_NAME)
}

pub fn load_configuration_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("allowed_users"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

impl AppConfig {
    /// Minimal config pointing at `panel_url`, with every optional setting at its default.
    pub fn new(panel_url: &str, application_api_key: &str, client_api_key: &str) -> Self {
        Self {
            panel_url: panel_url.to_string(),
            application_api_key: application_api_key.to_string(),
            client_api_key: client_api_key.to_string(),
            target_filename: default_target_filename(),
            auto_delete: true,
            backup_prefix: default_backup_prefix(),
            scan_subdirectories: true,
            max_scan_depth: default_max_scan_depth(),
            scan_timeout_secs: default_timeout_secs(),
            request_timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            state_path: default_state_path(),
            outbox_dir: default_outbox_dir(),
            allowed_users: Vec::new(),
        }
    }

    pub fn validate(mut self) -> Result<Self, Error> {
        let required = [
            ("panel_url", &self.panel_url),
            ("application_api_key", &self.application_api_key),
            ("client_api_key", &self.client_api_key),
            ("target_filename", &self.target_filename),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{} must be filled", name)));
            }
        }
        if self.retry_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        self.panel_url = self.panel_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }

    /// Extension used for backup artifacts, taken from the target filename.
    pub fn artifact_extension(&self) -> &str {
        match self.target_filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext,
            _ => "bin",
        }
    }
}
