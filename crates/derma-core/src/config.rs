//! Backend configuration.
//!
//! The only configurable value is the backend base address (plus the
//! per-request timeout). Resolution priority:
//! 1. `DERMA_BACKEND_URL` / `DERMA_REQUEST_TIMEOUT_SECS` environment variables
//! 2. `~/.config/derma-ai/config.toml`
//! 3. Built-in defaults

use crate::error::{DermaError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backend address used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
/// Per-request timeout used when nothing else is configured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub const BACKEND_URL_ENV: &str = "DERMA_BACKEND_URL";
pub const REQUEST_TIMEOUT_ENV: &str = "DERMA_REQUEST_TIMEOUT_SECS";

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Resolved backend settings shared by both remote operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    base_url: String,
    request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_URL)
    }
}

impl BackendConfig {
    /// Creates a config for the given base address with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The base address with no trailing slash, e.g. `http://localhost:8000`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Full URL for a backend route such as `/chat`.
    pub fn endpoint(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route.trim_start_matches('/'))
    }

    /// Resolves the config from the environment and the default config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the timeout environment variable is not a whole number of seconds.
    pub fn resolve() -> Result<Self> {
        let file = match default_config_path() {
            Some(path) => load_config_file(&path)?,
            None => None,
        };
        Self::from_sources(
            std::env::var(BACKEND_URL_ENV).ok(),
            std::env::var(REQUEST_TIMEOUT_ENV).ok(),
            file,
        )
    }

    /// Merges explicit sources. Environment values win over file values.
    pub fn from_sources(
        env_url: Option<String>,
        env_timeout: Option<String>,
        file: Option<ConfigFile>,
    ) -> Result<Self> {
        let file = file.unwrap_or_default();

        let base_url = env_url
            .filter(|url| !url.trim().is_empty())
            .or(file.backend_url.filter(|url| !url.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let timeout_secs = match env_timeout {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                DermaError::config(format!("{} must be a number of seconds: {}", REQUEST_TIMEOUT_ENV, e))
            })?,
            None => file
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        tracing::debug!(
            "[BackendConfig] Resolved base_url={}, timeout={}s",
            base_url,
            timeout_secs
        );

        Ok(Self::new(base_url).with_request_timeout(Duration::from_secs(timeout_secs)))
    }
}

/// Returns `~/.config/derma-ai/config.toml`, if a config directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("derma-ai").join("config.toml"))
}

/// Loads a config file. A missing file is not an error.
pub fn load_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        DermaError::config(format!(
            "Failed to read configuration file at {}: {}",
            path.display(),
            e
        ))
    })?;

    toml::from_str(&content).map(Some).map_err(|e| {
        DermaError::config(format!(
            "Failed to parse configuration file at {}: {}",
            path.display(),
            e
        ))
    })
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
