//! Client configuration.
//!
//! Read from environment variables:
//! - `API_BASE_URL` - backend base URL (default `http://localhost:8088`)
//! - `TASKPAD_DATA_DIR` - where the secure store lives (default `./.taskpad`)
//! - `TASKPAD_SECRET_PASSPHRASE` - optional passphrase for the secure store;
//!   without it a per-device key file is used

use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8088";
const DATA_DIR_NAME: &str = ".taskpad";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Cannot determine working directory: {0}")]
    WorkingDir(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, without trailing slash.
    pub api_base_url: String,
    /// Directory holding `secure-store.json`.
    pub data_dir: PathBuf,
    /// Passphrase for sealing stored secrets.
    pub secret_passphrase: Option<String>,
}

impl Config {
    pub fn new(api_base_url: &str, data_dir: PathBuf) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: normalize_base_url(api_base_url)?,
            data_dir,
            secret_passphrase: None,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(
            non_empty_env("API_BASE_URL").as_deref(),
            non_empty_env("TASKPAD_DATA_DIR").map(PathBuf::from),
            non_empty_env("TASKPAD_SECRET_PASSPHRASE"),
        )
    }

    /// Build from already-read values, filling defaults for missing or blank
    /// ones.
    pub fn resolve(
        api_base_url: Option<&str>,
        data_dir: Option<PathBuf>,
        secret_passphrase: Option<String>,
    ) -> Result<Self, ConfigError> {
        let base_url = api_base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL);

        let data_dir = match data_dir.filter(|dir| !dir.as_os_str().is_empty()) {
            Some(dir) => dir,
            None => std::env::current_dir()?.join(DATA_DIR_NAME),
        };

        let mut config = Self::new(base_url, data_dir)?;
        config.secret_passphrase = secret_passphrase
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        tracing::debug!(
            api_base_url = %config.api_base_url,
            data_dir = %config.data_dir.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.secret_passphrase = Some(passphrase.into());
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate an http(s) URL and drop any trailing slash.
fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let parsed = url::Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
