//! Configuration file support
//!
//! Credentials never live here; they come from flags or the environment.
//! The file only overrides endpoints, timeouts and polling.

mod loader;
mod validation;

pub use loader::resolve_config;

use std::path::PathBuf;
use std::time::Duration;

use extpilot_stores::{
    ChromeConfig, EdgeConfig, FirefoxConfig, PollPolicy, CHROME_API_URL, CHROME_TOKEN_URL,
    EDGE_API_URL, FIREFOX_API_URL,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// IO error while reading the file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root of `extpilot.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub http: HttpSection,
    pub chrome: ChromeSection,
    pub edge: EdgeSection,
    pub firefox: FirefoxSection,
}

/// Shared transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSection {
    /// Largest response body accepted from any store
    pub max_response_bytes: usize,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChromeSection {
    pub token_url: String,
    pub api_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ChromeSection {
    fn default() -> Self {
        Self {
            token_url: CHROME_TOKEN_URL.to_string(),
            api_url: CHROME_API_URL.to_string(),
            request_timeout_secs: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EdgeSection {
    /// Tenant token endpoint; `EDGE_ACCESS_TOKEN_URL` takes precedence
    pub token_url: Option<String>,
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
}

impl Default for EdgeSection {
    fn default() -> Self {
        Self {
            token_url: None,
            api_url: EDGE_API_URL.to_string(),
            request_timeout_secs: 5 * 60,
            poll_interval_secs: 5,
            poll_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FirefoxSection {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
    /// Where signed packages are written
    pub download_dir: PathBuf,
}

impl Default for FirefoxSection {
    fn default() -> Self {
        Self {
            api_url: FIREFOX_API_URL.to_string(),
            request_timeout_secs: 20 * 60,
            poll_interval_secs: 1,
            poll_timeout_secs: 20 * 60,
            download_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Chrome store settings for the given credentials
    pub fn chrome(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> ChromeConfig {
        let mut config = ChromeConfig::new(client_id, client_secret, refresh_token);
        config.token_url = self.chrome.token_url.clone();
        config.api_url = self.chrome.api_url.clone();
        config.request_timeout = Duration::from_secs(self.chrome.request_timeout_secs);
        config
    }

    /// Edge store settings; `token_url` wins over the file's value
    pub fn edge(
        &self,
        client_id: &str,
        client_secret: &str,
        token_url: Option<&str>,
    ) -> Result<EdgeConfig> {
        let token_url = token_url
            .map(str::to_string)
            .or_else(|| self.edge.token_url.clone())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "edge.token_url".to_string(),
                message: "set EDGE_ACCESS_TOKEN_URL or edge.token_url".to_string(),
            })?;

        let mut config = EdgeConfig::new(client_id, client_secret, token_url);
        config.api_url = self.edge.api_url.clone();
        config.request_timeout = Duration::from_secs(self.edge.request_timeout_secs);
        config.poll = PollPolicy::new(
            Duration::from_secs(self.edge.poll_interval_secs),
            Duration::from_secs(self.edge.poll_timeout_secs),
        );
        Ok(config)
    }

    /// Firefox store settings for the given credentials
    pub fn firefox(&self, client_id: &str, client_secret: &str) -> FirefoxConfig {
        let mut config = FirefoxConfig::new(client_id, client_secret);
        config.api_url = self.firefox.api_url.clone();
        config.request_timeout = Duration::from_secs(self.firefox.request_timeout_secs);
        config.poll = PollPolicy::new(
            Duration::from_secs(self.firefox.poll_interval_secs),
            Duration::from_secs(self.firefox.poll_timeout_secs),
        );
        config.download_dir = self.firefox.download_dir.clone();
        config
    }
}
