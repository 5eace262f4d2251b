//! Microsoft Edge Add-ons integration
//!
//! Uses the Edge Add-ons API v1. Both write operations are asynchronous:
//! the store answers `202 Accepted` with an operation ID in the `Location`
//! header, and the outcome is read from a separate status endpoint.
//!
//! Package uploads are polled until they settle. Publishing is checked
//! exactly once, because the store only reports the submission, not the
//! review that follows.
//!
//! ## Authentication
//!
//! Azure AD client-credentials grant. A fresh token is requested for every
//! call, including each poll tick.

use crate::archive::Package;
use crate::auth::{Authenticator, ClientCredentialsAuth, Credential, EDGE_SCOPE};
use crate::error::{Result, StoreError};
use crate::poll::{OperationState, OperationStatus, PollDriver};
use crate::traits::StoreAdapter;
use crate::transport::{
    join_url, parse_base_url, HttpRequest, HttpResponse, HttpTransport, Reply,
};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

// Re-export config from types
pub use crate::types::EdgeConfig;

const PRODUCTS_PATH: &str = "v1/products";

/// One entry of an operation's `errors` list
///
/// Anything that is neither a string nor carries a `message` is kept as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationError {
    Text(String),
    Detailed { message: String },
    Other(serde_json::Value),
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationError::Text(message) | OperationError::Detailed { message } => {
                write!(f, "{}", message)
            }
            OperationError::Other(value) => write!(f, "{}", value),
        }
    }
}

/// Status of an upload or publish operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationResponse {
    pub id: String,
    pub created_time: String,
    pub last_updated_time: String,
    pub status: String,
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub errors: Option<Vec<OperationError>>,
}

impl OperationResponse {
    /// Map the status string onto the poll states
    ///
    /// Unknown values are a protocol error rather than something to wait
    /// out.
    pub fn state(&self) -> Result<OperationState> {
        match self.status.as_str() {
            "InProgress" => Ok(OperationState::Pending),
            "Succeeded" => Ok(OperationState::Succeeded),
            "Failed" => Ok(OperationState::Failed),
            other => Err(StoreError::UnexpectedResponse(format!(
                "unknown operation status {:?}",
                other
            ))),
        }
    }

    /// Human readable failure summary
    pub fn failure_summary(&self) -> String {
        let mut summary = self
            .message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "no message".to_string());

        if let Some(code) = self.error_code.as_deref().filter(|c| !c.is_empty()) {
            summary.push_str(&format!(" (error code {})", code));
        }

        let errors: Vec<String> = self
            .errors
            .iter()
            .flatten()
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            summary.push_str(&format!(": {}", errors.join("; ")));
        }

        summary
    }
}

/// Edge Add-ons API client
pub struct EdgeStore {
    /// Configuration
    config: EdgeConfig,

    /// Parsed API host
    api_url: Url,

    /// Client-credentials authenticator
    auth: Authenticator,

    /// HTTP transport
    transport: Arc<dyn HttpTransport>,

    /// Clock, sleeper and cancellation for upload polling
    driver: PollDriver,
}

impl EdgeStore {
    /// Create a new Edge Add-ons client
    pub fn new(
        config: EdgeConfig,
        transport: Arc<dyn HttpTransport>,
        driver: PollDriver,
    ) -> Result<Self> {
        let api_url = parse_base_url(&config.api_url)?;
        parse_base_url(&config.token_url)?;

        let auth = Authenticator::ClientCredentials(ClientCredentialsAuth {
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: EDGE_SCOPE.to_string(),
        });

        Ok(Self {
            config,
            api_url,
            auth,
            transport,
            driver,
        })
    }

    async fn credential(&self) -> Result<Credential> {
        let clock = self.driver.clock();
        self.auth
            .obtain_credential(self.transport.as_ref(), clock.as_ref())
            .await
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let credential = self.credential().await?;
        let request = request
            .authorization(credential.authorization_header())
            .timeout(self.config.request_timeout);
        self.transport.execute(request).await
    }

    /// Pull the operation ID out of a `202 Accepted` reply
    fn operation_id(response: HttpResponse) -> Result<String> {
        let response = response.expect_status(&[202])?;
        match response.header("Location").map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(StoreError::UnexpectedResponse(
                "received empty operation ID".to_string(),
            )),
        }
    }

    /// Upload a package to the draft submission, returning the operation ID
    #[instrument(skip(self, package), fields(file = %package.file_name))]
    pub async fn upload_package(&self, app_id: &str, package: Package) -> Result<String> {
        let url = join_url(
            &self.api_url,
            &[PRODUCTS_PATH, app_id, "submissions/draft/package"],
            false,
        )?;

        info!("Uploading {} to product {}", package.file_name, app_id);
        let response = self
            .send(HttpRequest::post(url.as_str()).bytes(Some("application/zip"), package.bytes))
            .await?;

        let operation_id = Self::operation_id(response)?;
        debug!(operation_id = %operation_id, "Upload accepted");
        Ok(operation_id)
    }

    /// Check a package upload operation
    pub async fn upload_status(
        &self,
        app_id: &str,
        operation_id: &str,
    ) -> Result<OperationStatus<Reply<OperationResponse>>> {
        let url = join_url(
            &self.api_url,
            &[
                PRODUCTS_PATH,
                app_id,
                "submissions/draft/package/operations",
                operation_id,
            ],
            false,
        )?;

        let response = self
            .send(HttpRequest::get(url.as_str()))
            .await?
            .expect_status(&[200])?;
        debug!(body = %response.text(), "Upload status");

        classify(response.reply()?)
    }

    /// Upload a package and wait for the store to process it
    #[instrument(skip(self, package), fields(file = %package.file_name))]
    pub async fn update_package(
        &self,
        app_id: &str,
        package: Package,
    ) -> Result<Reply<OperationResponse>> {
        let operation_id = self.upload_package(app_id, package).await?;

        info!("Waiting for upload {} to be processed", operation_id);
        let status = self
            .driver
            .poll("Edge package upload", self.config.poll, || {
                self.upload_status(app_id, &operation_id)
            })
            .await?;

        match status.state {
            OperationState::Failed => Err(StoreError::ValidationFailed(format!(
                "update failed: {}",
                status.payload.failure_summary()
            ))),
            _ => {
                info!("Upload processed");
                Ok(status.payload)
            }
        }
    }

    /// Submit the draft for publication, returning the operation ID
    #[instrument(skip(self))]
    pub async fn submit(&self, app_id: &str) -> Result<String> {
        let url = join_url(&self.api_url, &[PRODUCTS_PATH, app_id, "submissions"], false)?;

        info!("Submitting product {} for publication", app_id);
        let response = self.send(HttpRequest::post(url.as_str())).await?;
        Self::operation_id(response)
    }

    /// Single look at a publish operation
    pub async fn publish_status(
        &self,
        app_id: &str,
        operation_id: &str,
    ) -> Result<OperationStatus<Reply<OperationResponse>>> {
        let url = join_url(
            &self.api_url,
            &[PRODUCTS_PATH, app_id, "submissions/operations", operation_id],
            false,
        )?;

        let response = self
            .send(HttpRequest::get(url.as_str()))
            .await?
            .expect_status(&[200])?;
        debug!(body = %response.text(), "Publish status");

        classify(response.reply()?)
    }

    /// Submit for publication and report the submission state
    ///
    /// An `InProgress` answer is a success: the submission is in review.
    #[instrument(skip(self))]
    pub async fn publish_product(&self, app_id: &str) -> Result<Reply<OperationResponse>> {
        let operation_id = self.submit(app_id).await?;
        let status = self.publish_status(app_id, &operation_id).await?;

        match status.state {
            OperationState::Failed => Err(StoreError::ValidationFailed(format!(
                "publish failed: {}",
                status.payload.failure_summary()
            ))),
            _ => Ok(status.payload),
        }
    }
}

fn classify(
    reply: Reply<OperationResponse>,
) -> Result<OperationStatus<Reply<OperationResponse>>> {
    Ok(OperationStatus {
        state: reply.state()?,
        payload: reply,
    })
}

#[async_trait::async_trait]
impl StoreAdapter for EdgeStore {
    fn name(&self) -> &str {
        "Edge Add-ons"
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Edge
    }

    fn supported_verbs(&self) -> &[Verb] {
        &[Verb::Update, Verb::Publish]
    }

    async fn update(&self, request: &SubmissionRequest) -> Result<Outcome> {
        let app_id = request.require_app_id()?;
        let package = Package::load(request.require_archive()?).await?;
        let response = self.update_package(app_id, package).await?;

        Ok(Outcome::new(
            StoreKind::Edge,
            Verb::Update,
            Payload::Raw(response.body),
        ))
    }

    async fn publish(&self, request: &SubmissionRequest) -> Result<Outcome> {
        let response = self.publish_product(request.require_app_id()?).await?;

        Ok(Outcome::new(
            StoreKind::Edge,
            Verb::Publish,
            Payload::Raw(response.body),
        ))
    }
}
