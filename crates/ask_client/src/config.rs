//! Client config load/save for `~/.ask-client/config.yaml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_CONNECT_SECS: u64 = 20;
pub const DEFAULT_RESOURCE_SECS: u64 = 60;
pub const DEFAULT_REQUEST_SECS: u64 = 30;

/// Server section (base_url).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Timeout section, all values in seconds.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TimeoutSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_secs: Option<u64>,
}

/// Full config file.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub timeouts: TimeoutSection,
}

/// Resolved timeouts applied to the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Connection establishment and idle read.
    pub connect: Duration,
    /// Total time for one request on the client.
    pub resource: Duration,
    /// Per-call override.
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_SECS),
            resource: Duration::from_secs(DEFAULT_RESOURCE_SECS),
            request: Duration::from_secs(DEFAULT_REQUEST_SECS),
        }
    }
}

impl Timeouts {
    /// Per-call timeout actually applied: the shorter of `request` and `resource`.
    pub fn effective_request(&self) -> Duration {
        self.request.min(self.resource)
    }
}

impl Config {
    /// Validated base URL without a trailing slash.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        let raw = self
            .server
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim();
        normalize_base_url(raw)
    }

    pub fn timeouts(&self) -> Timeouts {
        let defaults = Timeouts::default();
        let secs = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };
        Timeouts {
            connect: secs(self.timeouts.connect_secs, defaults.connect),
            resource: secs(self.timeouts.resource_secs, defaults.resource),
            request: secs(self.timeouts.request_secs, defaults.request),
        }
    }
}

/// Check that `raw` is an http(s) URL and strip any trailing `/`.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = reqwest::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Returns the default config file path: `~/.ask-client/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".ask-client").join("config.yaml"))
}

/// Load config from a YAML file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Load config if the file exists, defaults otherwise.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        load(path)
    } else {
        Ok(Config::default())
    }
}

/// Save config to a YAML file. Creates parent directory if missing.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
    }
    let contents = serde_yaml::to_string(config).map_err(|e| ConfigError::Parse(e.to_string()))?;
    std::fs::write(path, contents).map_err(|e| ConfigError::Io(e.to_string()))
}
