//! Common types for store adapters

use crate::error::StoreError;
use crate::poll::PollPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default Google OAuth token endpoint
pub const CHROME_TOKEN_URL: &str = "https://accounts.google.com/o/oauth2/token";
/// Default Chrome Web Store API host
pub const CHROME_API_URL: &str = "https://www.googleapis.com";
/// Default Edge Add-ons API host
pub const EDGE_API_URL: &str = "https://api.addons.microsoftedge.microsoft.com";
/// Default addons.mozilla.org host
pub const FIREFOX_API_URL: &str = "https://addons.mozilla.org";

/// Store type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Chrome Web Store
    Chrome,
    /// Microsoft Edge Add-ons
    Edge,
    /// addons.mozilla.org
    Firefox,
}

impl StoreKind {
    pub const ALL: [StoreKind; 3] = [StoreKind::Chrome, StoreKind::Edge, StoreKind::Firefox];

    /// Lowercase identifier used on the command line and in config
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Chrome => "chrome",
            StoreKind::Edge => "edge",
            StoreKind::Firefox => "firefox",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Chrome => write!(f, "Chrome Web Store"),
            StoreKind::Edge => write!(f, "Edge Add-ons"),
            StoreKind::Firefox => write!(f, "Firefox Add-ons"),
        }
    }
}

impl FromStr for StoreKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" => Ok(StoreKind::Chrome),
            "edge" => Ok(StoreKind::Edge),
            "firefox" | "amo" => Ok(StoreKind::Firefox),
            other => Err(StoreError::InvalidRequest(format!("unknown store: {}", other))),
        }
    }
}

/// Operation requested against a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// Fetch the current store listing
    Status,
    /// Upload a package for a new item
    Insert,
    /// Upload a new version of an existing item
    Update,
    /// Submit the current draft for publication
    Publish,
    /// Get a package signed and download it
    Sign,
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verb::Status => write!(f, "status"),
            Verb::Insert => write!(f, "insert"),
            Verb::Update => write!(f, "update"),
            Verb::Publish => write!(f, "publish"),
            Verb::Sign => write!(f, "sign"),
        }
    }
}

/// One verb invocation against one extension package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub store: StoreKind,

    /// Store item ID; absent for a first Chrome insert, and Firefox reads
    /// it from the manifest for every archive based verb
    pub app_id: Option<String>,

    /// Packaged extension archive
    pub archive: Option<PathBuf>,

    /// Source code archive (Firefox only)
    pub source: Option<PathBuf>,
}

impl SubmissionRequest {
    pub fn new(store: StoreKind) -> Self {
        Self {
            store,
            app_id: None,
            archive: None,
            source: None,
        }
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive = Some(path.into());
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn require_app_id(&self) -> Result<&str, StoreError> {
        self.app_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| StoreError::InvalidRequest("an app ID is required".into()))
    }

    pub fn require_archive(&self) -> Result<&Path, StoreError> {
        self.archive
            .as_deref()
            .ok_or_else(|| StoreError::InvalidRequest("an extension archive is required".into()))
    }

    pub fn require_source(&self) -> Result<&Path, StoreError> {
        self.source
            .as_deref()
            .ok_or_else(|| StoreError::InvalidRequest("a source archive is required".into()))
    }
}

/// Chrome Web Store configuration
#[derive(Debug, Clone)]
pub struct ChromeConfig {
    /// OAuth client ID
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// Long-lived refresh token
    pub refresh_token: String,

    /// OAuth token endpoint
    pub token_url: String,

    /// API host
    pub api_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ChromeConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            token_url: CHROME_TOKEN_URL.to_string(),
            api_url: CHROME_API_URL.to_string(),
            request_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Edge Add-ons configuration
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    /// Azure AD client ID
    pub client_id: String,

    /// Azure AD client secret
    pub client_secret: String,

    /// Tenant specific token endpoint shown in Partner Center
    pub token_url: String,

    /// API host
    pub api_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Upload status polling
    pub poll: PollPolicy,
}

impl EdgeConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: token_url.into(),
            api_url: EDGE_API_URL.to_string(),
            request_timeout: Duration::from_secs(5 * 60),
            poll: PollPolicy::new(Duration::from_secs(5), Duration::from_secs(60)),
        }
    }
}

/// addons.mozilla.org configuration
#[derive(Debug, Clone)]
pub struct FirefoxConfig {
    /// JWT issuer (AMO API key)
    pub client_id: String,

    /// JWT secret (AMO API secret)
    pub client_secret: String,

    /// API host
    pub api_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Validation and signing polling
    pub poll: PollPolicy,

    /// Where signed packages are written
    pub download_dir: PathBuf,
}

impl FirefoxConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_url: FIREFOX_API_URL.to_string(),
            request_timeout: Duration::from_secs(20 * 60),
            poll: PollPolicy::new(Duration::from_secs(1), Duration::from_secs(20 * 60)),
            download_dir: PathBuf::from("."),
        }
    }
}

/// Terminal result payload of a verb
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Store response body, passed through untouched
    Raw(String),
    /// Typed store response
    Json(serde_json::Value),
    /// File written to disk
    File(PathBuf),
    /// Pipeline finished with nothing to report
    Done,
}

/// Result of a successfully completed verb
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub store: StoreKind,
    pub verb: Verb,
    pub payload: Payload,

    /// Accepted responses that still look wrong
    pub warnings: Vec<String>,
}

impl Outcome {
    pub fn new(store: StoreKind, verb: Verb, payload: Payload) -> Self {
        Self {
            store,
            verb,
            payload,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}
