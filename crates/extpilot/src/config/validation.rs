//! Configuration validation

use tracing::debug;
use url::Url;

use super::{Config, ConfigError, Result};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");

    if config.http.max_response_bytes == 0 {
        return Err(invalid("http.max_response_bytes", "must be positive"));
    }

    validate_url("chrome.token_url", &config.chrome.token_url)?;
    validate_url("chrome.api_url", &config.chrome.api_url)?;
    validate_timeout("chrome.request_timeout_secs", config.chrome.request_timeout_secs)?;

    if let Some(token_url) = &config.edge.token_url {
        validate_url("edge.token_url", token_url)?;
    }
    validate_url("edge.api_url", &config.edge.api_url)?;
    validate_timeout("edge.request_timeout_secs", config.edge.request_timeout_secs)?;
    validate_poll(
        "edge",
        config.edge.poll_interval_secs,
        config.edge.poll_timeout_secs,
    )?;

    validate_url("firefox.api_url", &config.firefox.api_url)?;
    validate_timeout(
        "firefox.request_timeout_secs",
        config.firefox.request_timeout_secs,
    )?;
    validate_poll(
        "firefox",
        config.firefox.poll_interval_secs,
        config.firefox.poll_timeout_secs,
    )?;
    if config.firefox.download_dir.as_os_str().is_empty() {
        return Err(invalid("firefox.download_dir", "cannot be empty"));
    }

    debug!("configuration validation passed");
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, "cannot be empty"));
    }
    let url = Url::parse(value).map_err(|e| invalid(field, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(field, format!("unsupported scheme {}", other))),
    }
}

fn validate_timeout(field: &str, secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(invalid(field, "must be positive"));
    }
    Ok(())
}

fn validate_poll(store: &str, interval_secs: u64, timeout_secs: u64) -> Result<()> {
    if interval_secs == 0 {
        return Err(invalid(
            &format!("{}.poll_interval_secs", store),
            "must be positive",
        ));
    }
    if interval_secs > timeout_secs {
        return Err(invalid(
            &format!("{}.poll_timeout_secs", store),
            "must not be shorter than poll_interval_secs",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::InvalidValue { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_urls() {
        let mut config = Config::default();
        config.chrome.api_url = String::new();
        assert_eq!(field_of(validate_config(&config).unwrap_err()), "chrome.api_url");

        let mut config = Config::default();
        config.edge.token_url = Some("not a url".to_string());
        assert_eq!(field_of(validate_config(&config).unwrap_err()), "edge.token_url");

        let mut config = Config::default();
        config.firefox.api_url = "ftp://addons.test".to_string();
        assert_eq!(field_of(validate_config(&config).unwrap_err()), "firefox.api_url");
    }

    #[test]
    fn test_rejects_bad_polling() {
        let mut config = Config::default();
        config.edge.poll_interval_secs = 0;
        assert_eq!(
            field_of(validate_config(&config).unwrap_err()),
            "edge.poll_interval_secs"
        );

        let mut config = Config::default();
        config.firefox.poll_interval_secs = 10;
        config.firefox.poll_timeout_secs = 5;
        assert_eq!(
            field_of(validate_config(&config).unwrap_err()),
            "firefox.poll_timeout_secs"
        );
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = Config::default();
        config.http.max_response_bytes = 0;
        assert_eq!(
            field_of(validate_config(&config).unwrap_err()),
            "http.max_response_bytes"
        );

        let mut config = Config::default();
        config.chrome.request_timeout_secs = 0;
        assert_eq!(
            field_of(validate_config(&config).unwrap_err()),
            "chrome.request_timeout_secs"
        );
    }
}
