//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::validation::validate_config;
use super::{Config, ConfigError, Result};

/// Name searched for in each directory
pub const CONFIG_FILE_NAME: &str = "extpilot.toml";

/// Load and validate a configuration file
pub fn load_config(path: &Path) -> Result<Config> {
    info!(path = %path.display(), "loading config");

    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;

    validate_config(&config)?;
    debug!(path = %path.display(), "config loaded and validated");
    Ok(config)
}

/// Find configuration file in directory or parent directories.
///
/// At each directory level the search checks `<dir>/extpilot.toml`, then
/// `<dir>/.github/extpilot.toml`. The first match wins.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for config file");
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            info!(path = %config_path.display(), "found config file");
            return Some(config_path);
        }

        let github_path = current.join(".github").join(CONFIG_FILE_NAME);
        if github_path.is_file() {
            info!(path = %github_path.display(), "found config file in .github/");
            return Some(github_path);
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no config file found");
    None
}

/// Explicit path, else the nearest file from `start_dir`, else defaults
pub fn resolve_config(explicit: Option<&Path>, start_dir: &Path) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => match find_config(start_dir) {
            Some(path) => load_config(&path),
            None => {
                debug!("using default configuration");
                Ok(Config::default())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_in_dir() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "").unwrap();

        assert_eq!(find_config(temp.path()), Some(config_path));
    }

    #[test]
    fn test_find_config_in_github_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".github")).unwrap();
        let config_path = temp.path().join(".github").join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "").unwrap();

        assert_eq!(find_config(temp.path()), Some(config_path));
    }

    #[test]
    fn test_find_config_walks_up() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "").unwrap();
        let nested = temp.path().join("packages").join("addon");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested), Some(config_path));
    }

    #[test]
    fn test_load_overrides() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
[http]
max_response_bytes = 1024

[edge]
token_url = "https://login.test/tenant/token"
poll_interval_secs = 2
poll_timeout_secs = 30

[firefox]
api_url = "https://addons.allizom.org"
download_dir = "dist"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.http.max_response_bytes, 1024);
        assert_eq!(config.edge.poll_interval_secs, 2);
        assert_eq!(config.edge.poll_timeout_secs, 30);
        assert_eq!(config.firefox.api_url, "https://addons.allizom.org");
        assert_eq!(config.firefox.download_dir, PathBuf::from("dist"));
        assert_eq!(config.chrome, Config::default().chrome);
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[chrome]\napi_ur = \"https://x.test\"\n").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_explicit_missing_path() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");

        let err = resolve_config(Some(&missing), temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_resolve_without_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = resolve_config(None, temp.path()).unwrap();
        assert_eq!(config, Config::default());
    }
}
