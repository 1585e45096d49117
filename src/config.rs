// ABOUTME: Application configuration loaded from TOML, then overridden by environment and CLI
// Validates the lab API base URL once at load time

use crate::terminal::backoff::ReconnectConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";
pub const ENV_API_BASE_URL: &str = "LABTERM_API_BASE_URL";
pub const ENV_SESSION_ID: &str = "LABTERM_SESSION_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid API base URL {url}: {reason}")]
    InvalidApiBase { url: String, reason: String },

    #[error("No lab session id configured (use --session or LABTERM_SESSION_ID)")]
    MissingSession,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Delay between session status polls while provisioning.
    pub poll_interval_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub session_id: Option<String>,
    pub reconnect: ReconnectConfig,
    pub readiness: ReadinessConfig,
    pub request_timeout_ms: u64,
    pub request_retries: u32,
    pub notification_ttl_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_id: None,
            reconnect: ReconnectConfig::default(),
            readiness: ReadinessConfig::default(),
            request_timeout_ms: 30_000,
            request_retries: 2,
            notification_ttl_ms: 5000,
        }
    }
}

impl AppConfig {
    /// `<config_dir>/labterm/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "labterm").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load `path`, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `LABTERM_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(session) = lookup(ENV_SESSION_ID).filter(|v| !v.is_empty()) {
            self.session_id = Some(session);
        }
    }

    /// The API base as an `http`/`https` URL.
    pub fn api_base(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidApiBase {
            url: self.api_base_url.clone(),
            reason,
        };
        let url = Url::parse(&self.api_base_url).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(format!("unsupported scheme {other}"))),
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        Ok(url)
    }

    pub fn session(&self) -> Result<&str, ConfigError> {
        self.session_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingSession)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.readiness.poll_interval_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}
