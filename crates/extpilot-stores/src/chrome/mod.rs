//! Chrome Web Store integration
//!
//! Uses the Chrome Web Store API v1.1. Every call is synchronous: the store
//! validates an upload within the request and answers with its final
//! state, so nothing here polls.
//!
//! ## Authentication
//!
//! OAuth2 refresh-token grant against Google, one fresh access token per
//! verb.
//!
//! ## Usage
//!
//! ```ignore
//! use extpilot_stores::chrome::ChromeStore;
//!
//! let store = ChromeStore::new(config, transport, clock)?;
//! let item = store.item_status("abcdefghijklmnop").await?;
//! ```

use crate::archive::Package;
use crate::auth::{Authenticator, Credential, RefreshTokenAuth};
use crate::clock::Clock;
use crate::error::Result;
use crate::traits::StoreAdapter;
use crate::transport::{join_url, parse_base_url, HttpRequest, HttpTransport};
pub use crate::transport::Reply;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

// Re-export config from types
pub use crate::types::ChromeConfig;

const ITEMS_PATH: &str = "chromewebstore/v1.1/items";
const UPLOAD_PATH: &str = "upload/chromewebstore/v1.1/items";

/// Item as returned by the status endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemStatus {
    pub kind: String,
    pub id: String,
    pub public_key: String,
    pub upload_state: String,
    pub crx_version: String,
    pub item_error: Vec<ItemError>,
}

/// Problem reported alongside an upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemError {
    pub error_code: String,
    pub error_detail: String,
}

/// Result of an insert or update upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadResponse {
    pub kind: String,
    pub id: String,
    pub upload_state: String,
    pub item_error: Vec<ItemError>,
}

impl UploadResponse {
    /// The store accepted the request but rejected the package
    pub fn is_failure(&self) -> bool {
        matches!(self.upload_state.as_str(), "FAILURE" | "NOT_FOUND")
    }
}

/// Result of a publish request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishResponse {
    pub kind: String,
    pub item_id: String,
    pub status: Vec<String>,
    #[serde(rename = "statusDetail")]
    pub status_detail: Vec<String>,
}

impl PublishResponse {
    /// Any status other than `OK` or a pending review
    pub fn is_failure(&self) -> bool {
        self.status
            .iter()
            .any(|s| s != "OK" && s != "ITEM_PENDING_REVIEW")
    }
}

/// Chrome Web Store API client
pub struct ChromeStore {
    /// Configuration
    config: ChromeConfig,

    /// Parsed API host
    api_url: Url,

    /// Refresh-token authenticator
    auth: Authenticator,

    /// HTTP transport
    transport: Arc<dyn HttpTransport>,

    clock: Arc<dyn Clock>,
}

impl ChromeStore {
    /// Create a new Chrome Web Store client
    pub fn new(
        config: ChromeConfig,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let api_url = parse_base_url(&config.api_url)?;
        let auth = Authenticator::RefreshToken(RefreshTokenAuth {
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
        });

        Ok(Self {
            config,
            api_url,
            auth,
            transport,
            clock,
        })
    }

    async fn credential(&self) -> Result<Credential> {
        self.auth
            .obtain_credential(self.transport.as_ref(), self.clock.as_ref())
            .await
    }

    /// Send an authorized request and decode a 200 response
    async fn call<T: serde::de::DeserializeOwned>(&self, request: HttpRequest) -> Result<Reply<T>> {
        let credential = self.credential().await?;
        let request = request
            .authorization(credential.authorization_header())
            .timeout(self.config.request_timeout);

        let response = self.transport.execute(request).await?.expect_status(&[200])?;
        let reply = response.reply()?;
        debug!(body = %reply.body, "Chrome Web Store response");
        Ok(reply)
    }

    /// Fetch the draft state of an item
    #[instrument(skip(self))]
    pub async fn item_status(&self, app_id: &str) -> Result<Reply<ItemStatus>> {
        let mut url = join_url(&self.api_url, &[ITEMS_PATH, app_id], false)?;
        url.query_pairs_mut().append_pair("projection", "DRAFT");

        self.call(HttpRequest::get(url.as_str())).await
    }

    /// Upload a package as a brand new item
    #[instrument(skip(self, package), fields(file = %package.file_name))]
    pub async fn insert_package(&self, package: Package) -> Result<Reply<UploadResponse>> {
        let url = join_url(&self.api_url, &[UPLOAD_PATH], false)?;

        info!("Uploading {} as a new item", package.file_name);
        let result: Reply<UploadResponse> = self
            .call(HttpRequest::post(url.as_str()).bytes(None, package.bytes))
            .await?;

        info!(id = %result.id, state = %result.upload_state, "Insert complete");
        Ok(result)
    }

    /// Upload a new package for an existing item
    #[instrument(skip(self, package), fields(file = %package.file_name))]
    pub async fn update_package(
        &self,
        app_id: &str,
        package: Package,
    ) -> Result<Reply<UploadResponse>> {
        let url = join_url(&self.api_url, &[UPLOAD_PATH, app_id], false)?;

        info!("Uploading {} to item {}", package.file_name, app_id);
        let result: Reply<UploadResponse> = self
            .call(HttpRequest::put(url.as_str()).bytes(None, package.bytes))
            .await?;

        info!(state = %result.upload_state, "Update complete");
        Ok(result)
    }

    /// Submit the item for review and publication
    #[instrument(skip(self))]
    pub async fn publish_item(&self, app_id: &str) -> Result<Reply<PublishResponse>> {
        let url = join_url(&self.api_url, &[ITEMS_PATH, app_id, "publish"], false)?;

        info!("Publishing item {}", app_id);
        self.call(HttpRequest::post(url.as_str())).await
    }
}

fn upload_outcome(verb: Verb, response: Reply<UploadResponse>) -> Outcome {
    let warning = response.is_failure().then(|| {
        warn!(state = %response.upload_state, "Upload accepted but not applied");
        format!("upload state is {}", response.upload_state)
    });

    let outcome = Outcome::new(StoreKind::Chrome, verb, Payload::Raw(response.body));
    match warning {
        Some(warning) => outcome.with_warning(warning),
        None => outcome,
    }
}

#[async_trait::async_trait]
impl StoreAdapter for ChromeStore {
    fn name(&self) -> &str {
        "Chrome Web Store"
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Chrome
    }

    fn supported_verbs(&self) -> &[Verb] {
        &[Verb::Status, Verb::Insert, Verb::Update, Verb::Publish]
    }

    async fn status(&self, request: &SubmissionRequest) -> Result<Outcome> {
        let item = self.item_status(request.require_app_id()?).await?;
        Ok(Outcome::new(
            StoreKind::Chrome,
            Verb::Status,
            Payload::Raw(item.body),
        ))
    }

    async fn insert(&self, request: &SubmissionRequest) -> Result<Outcome> {
        let package = Package::load(request.require_archive()?).await?;
        let response = self.insert_package(package).await?;
        Ok(upload_outcome(Verb::Insert, response))
    }

    async fn update(&self, request: &SubmissionRequest) -> Result<Outcome> {
        let app_id = request.require_app_id()?;
        let package = Package::load(request.require_archive()?).await?;
        let response = self.update_package(app_id, package).await?;
        Ok(upload_outcome(Verb::Update, response))
    }

    async fn publish(&self, request: &SubmissionRequest) -> Result<Outcome> {
        let response = self.publish_item(request.require_app_id()?).await?;

        let warning = response.is_failure().then(|| {
            warn!(status = ?response.status, "Publish accepted with failure status");
            format!(
                "publish status {}: {}",
                response.status.join(", "),
                response.status_detail.join(" ")
            )
        });

        let outcome = Outcome::new(StoreKind::Chrome, Verb::Publish, Payload::Raw(response.body));
        Ok(match warning {
            Some(warning) => outcome.with_warning(warning),
            None => outcome,
        })
    }
}
