//! addons.mozilla.org integration
//!
//! Uses the AMO v5 add-ons API. Publishing is a chain of dependent calls:
//!
//! - **insert**: upload new add-on, wait for validation, look up the
//!   version ID, attach the source archive
//! - **update**: upload new version, then the same chain
//! - **sign**: upload new version, wait for signing, download the signed
//!   file
//!
//! Every step aborts the chain on error; nothing already accepted by the
//! store is rolled back.
//!
//! ## Authentication
//!
//! HS256 JWT signed with the API secret. Assertions live five minutes and
//! a signing wait can take twenty, so a new one is signed for every
//! request.

mod status;

pub use status::{ReviewedStatus, VersionFile, VersionStatus};

use crate::archive::{Manifest, Package};
use crate::auth::{Authenticator, SignedAssertionAuth};
use crate::error::{Result, StoreError};
use crate::poll::{OperationState, OperationStatus, PollDriver};
use crate::traits::StoreAdapter;
use crate::transport::{join_url, parse_base_url, HttpRequest, HttpResponse, HttpTransport};
use crate::types::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

// Re-export config from types
pub use crate::types::FirefoxConfig;

const ADDONS_PATH: &str = "api/v5/addons";
const ADDON_PATH: &str = "api/v5/addons/addon";

#[derive(Debug, Deserialize)]
struct VersionEntry {
    id: u64,
    version: String,
}

#[derive(Debug, Deserialize)]
struct VersionPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<VersionEntry>,
}

/// What an insert or update left behind on the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub extension_id: String,
    pub version: String,
    pub version_id: String,
    /// Validator verdict; invalid versions still get their source attached
    pub valid: bool,
    pub validation_url: Option<String>,
}

/// addons.mozilla.org API client
pub struct FirefoxStore {
    /// Configuration
    config: FirefoxConfig,

    /// Parsed API host
    api_url: Url,

    /// JWT signer
    auth: Authenticator,

    /// HTTP transport
    transport: Arc<dyn HttpTransport>,

    /// Clock, sleeper and cancellation for validation and signing waits
    driver: PollDriver,
}

impl FirefoxStore {
    /// Create a new AMO client
    pub fn new(
        config: FirefoxConfig,
        transport: Arc<dyn HttpTransport>,
        driver: PollDriver,
    ) -> Result<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(StoreError::InvalidCredentials(
                "AMO API key and secret are required".to_string(),
            ));
        }

        let api_url = parse_base_url(&config.api_url)?;
        let auth = Authenticator::SignedAssertion(SignedAssertionAuth {
            issuer: config.client_id.clone(),
            secret: config.client_secret.clone(),
        });

        Ok(Self {
            config,
            api_url,
            auth,
            transport,
            driver,
        })
    }

    /// Sign a fresh assertion and send the request
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let clock = self.driver.clock();
        let credential = self
            .auth
            .obtain_credential(self.transport.as_ref(), clock.as_ref())
            .await?;

        let request = request
            .authorization(credential.authorization_header())
            .timeout(self.config.request_timeout);
        self.transport.execute(request).await
    }

    /// Raw add-on details
    #[instrument(skip(self))]
    pub async fn addon_status(&self, app_id: &str) -> Result<String> {
        let url = join_url(&self.api_url, &[ADDON_PATH, app_id], false)?;
        let response = self
            .send(HttpRequest::get(url.as_str()))
            .await?
            .expect_status(&[200])?;
        Ok(response.text())
    }

    /// Upload a package for an add-on AMO has never seen
    #[instrument(skip(self, package), fields(file = %package.file_name))]
    pub async fn upload_new(&self, package: Package) -> Result<String> {
        let url = join_url(&self.api_url, &[ADDONS_PATH], true)?;

        info!("Uploading new add-on {}", package.file_name);
        let response = self
            .send(HttpRequest::post(url.as_str()).multipart(
                "upload",
                package.file_name,
                package.bytes,
            ))
            .await?
            .expect_status(&[201, 202])?;

        let body = response.text();
        debug!(response = %body, "Uploaded new add-on");
        Ok(body)
    }

    /// Upload a package as a new version of an existing add-on
    #[instrument(skip(self, package), fields(file = %package.file_name))]
    pub async fn upload_version(
        &self,
        app_id: &str,
        version: &str,
        package: Package,
    ) -> Result<String> {
        let url = join_url(&self.api_url, &[ADDONS_PATH, app_id, "versions", version], true)?;

        info!("Uploading {} as version {} of {}", package.file_name, version, app_id);
        let response = self
            .send(HttpRequest::put(url.as_str()).multipart(
                "upload",
                package.file_name,
                package.bytes,
            ))
            .await?
            .expect_status(&[201, 202])?;

        let body = response.text();
        debug!(response = %body, "Uploaded version");
        Ok(body)
    }

    /// Current state of an uploaded version
    pub async fn version_status(&self, app_id: &str, version: &str) -> Result<VersionStatus> {
        let url = join_url(&self.api_url, &[ADDONS_PATH, app_id, "versions", version], false)?;
        let response = self
            .send(HttpRequest::get(url.as_str()))
            .await?
            .expect_status(&[200])?;

        let status: VersionStatus = response.json()?;
        debug!(?status, "Version status");
        Ok(status)
    }

    async fn validation_status(
        &self,
        app_id: &str,
        version: &str,
    ) -> Result<OperationStatus<VersionStatus>> {
        Ok(self.version_status(app_id, version).await?.validation())
    }

    async fn signing_status(
        &self,
        app_id: &str,
        version: &str,
    ) -> Result<OperationStatus<VersionStatus>> {
        Ok(self.version_status(app_id, version).await?.signing())
    }

    /// Wait until the validator has processed the upload
    #[instrument(skip(self))]
    pub async fn await_validation(&self, app_id: &str, version: &str) -> Result<VersionStatus> {
        info!("Waiting for validation of {} {}", app_id, version);

        let status = self
            .driver
            .poll("AMO validation", self.config.poll, || {
                self.validation_status(app_id, version)
            })
            .await?;

        if !status.payload.valid {
            warn!(
                validation_url = ?status.payload.validation_url,
                "Validation processed with errors"
            );
        }
        Ok(status.payload)
    }

    /// Map a version string to AMO's numeric version ID
    #[instrument(skip(self))]
    pub async fn version_id(&self, app_id: &str, version: &str) -> Result<String> {
        let mut url = join_url(&self.api_url, &[ADDON_PATH, app_id, "versions"], false)?;
        url.query_pairs_mut().append_pair("filter", "all_with_unlisted");
        let mut next = Some(url.to_string());

        while let Some(page_url) = next.take() {
            let page: VersionPage = self
                .send(HttpRequest::get(page_url.as_str()))
                .await?
                .expect_status(&[200])?
                .json()?;

            if let Some(entry) = page.results.iter().find(|v| v.version == version) {
                debug!(version_id = entry.id, "Found version");
                return Ok(entry.id.to_string());
            }

            next = page.next.filter(|n| !n.is_empty() && *n != page_url);
        }

        Err(StoreError::NotFound(format!("version {} of {}", version, app_id)))
    }

    /// Attach a source archive to a validated version
    #[instrument(skip(self, source), fields(file = %source.file_name))]
    pub async fn upload_source(
        &self,
        app_id: &str,
        version_id: &str,
        source: Package,
    ) -> Result<String> {
        let url = join_url(
            &self.api_url,
            &[ADDON_PATH, app_id, "versions", version_id],
            true,
        )?;

        info!("Uploading source {} for version {}", source.file_name, version_id);
        let response = self
            .send(HttpRequest::patch(url.as_str()).multipart(
                "source",
                source.file_name,
                source.bytes,
            ))
            .await?
            .expect_status(&[200])?;

        debug!("Source uploaded");
        Ok(response.text())
    }

    /// Wait until the version is signed
    #[instrument(skip(self))]
    pub async fn await_signing(&self, app_id: &str, version: &str) -> Result<VersionStatus> {
        info!("Waiting for {} {} to be signed", app_id, version);

        let status = self
            .driver
            .poll("AMO signing", self.config.poll, || {
                self.signing_status(app_id, version)
            })
            .await?;

        match status.state {
            OperationState::Failed if status.payload.requires_manual_review() => {
                Err(StoreError::ValidationFailed(format!(
                    "{} {} won't be signed automatically and needs manual review",
                    app_id, version
                )))
            }
            OperationState::Failed => Err(StoreError::ValidationFailed(format!(
                "{} {} did not pass validation{}",
                app_id,
                version,
                status
                    .payload
                    .validation_url
                    .as_deref()
                    .map(|u| format!(", see {}", u))
                    .unwrap_or_default()
            ))),
            _ => Ok(status.payload),
        }
    }

    /// Download the first signed file of a version into the download dir
    #[instrument(skip(self, status))]
    pub async fn download_signed(&self, status: &VersionStatus) -> Result<PathBuf> {
        let file = status
            .files
            .first()
            .ok_or_else(|| StoreError::NotFound("no files to download".to_string()))?;

        let url = Url::parse(&file.download_url).map_err(|e| {
            StoreError::UnexpectedResponse(format!(
                "invalid download URL {}: {}",
                file.download_url, e
            ))
        })?;
        let file_name = signed_file_name(&url)?;

        info!("Downloading {}", url);
        let response = self
            .send(HttpRequest::get(url.as_str()))
            .await?
            .expect_status(&[200])?;

        if let Some(expected) = file.hash.as_deref() {
            verify_hash(expected, &response.body)?;
        }

        let path = save_signed(&self.config.download_dir, &file_name, response.body).await?;

        info!("Saved signed package to {}", path.display());
        Ok(path)
    }

    async fn attach_source(
        &self,
        manifest: &Manifest,
        validation: VersionStatus,
        source: &Path,
    ) -> Result<SubmissionReport> {
        let version_id = self
            .version_id(&manifest.extension_id, &manifest.version)
            .await?;

        let source = Package::load(source).await?;
        self.upload_source(&manifest.extension_id, &version_id, source)
            .await?;

        Ok(SubmissionReport {
            extension_id: manifest.extension_id.clone(),
            version: manifest.version.clone(),
            version_id,
            valid: validation.valid,
            validation_url: validation.validation_url,
        })
    }

    /// First submission of an add-on, with its source
    pub async fn insert_addon(&self, archive: &Path, source: &Path) -> Result<SubmissionReport> {
        let manifest = Manifest::load(archive).await?;
        let package = Package::load(archive).await?;

        self.upload_new(package).await?;
        let validation = self
            .await_validation(&manifest.extension_id, &manifest.version)
            .await?;
        self.attach_source(&manifest, validation, source).await
    }

    /// New version of an existing add-on, with its source
    pub async fn update_addon(&self, archive: &Path, source: &Path) -> Result<SubmissionReport> {
        let manifest = Manifest::load(archive).await?;
        let package = Package::load(archive).await?;

        self.upload_version(&manifest.extension_id, &manifest.version, package)
            .await?;
        let validation = self
            .await_validation(&manifest.extension_id, &manifest.version)
            .await?;
        self.attach_source(&manifest, validation, source).await
    }

    /// Upload, wait for signing and download the signed package
    pub async fn sign_addon(&self, archive: &Path) -> Result<PathBuf> {
        let manifest = Manifest::load(archive).await?;
        let package = Package::load(archive).await?;

        self.upload_version(&manifest.extension_id, &manifest.version, package)
            .await?;
        let signed = self
            .await_signing(&manifest.extension_id, &manifest.version)
            .await?;
        self.download_signed(&signed).await
    }
}

/// Write the signed package under `dir`
///
/// The bytes land in a temporary file next to the target and are renamed
/// into place, so the final path never holds a partial package.
async fn save_signed(dir: &Path, file_name: &str, body: Vec<u8>) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let dir = dir.to_path_buf();
    let path = dir.join(file_name);

    let target = path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        file.write_all(&body)?;
        file.as_file().sync_all()?;
        file.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

    Ok(path)
}

/// Last path segment of the download URL
fn signed_file_name(url: &Url) -> Result<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
        .ok_or_else(|| {
            StoreError::UnexpectedResponse(format!("no file name in download URL {}", url))
        })
}

/// Check a `sha256:<hex>` digest; other algorithms are not checked
fn verify_hash(expected: &str, data: &[u8]) -> Result<()> {
    let Some(hex) = expected.strip_prefix("sha256:") else {
        debug!(hash = expected, "Skipping unsupported hash");
        return Ok(());
    };

    let actual = format!("{:x}", Sha256::digest(data));
    if actual.eq_ignore_ascii_case(hex) {
        Ok(())
    } else {
        Err(StoreError::ValidationFailed(format!(
            "signed file hash mismatch: expected {}, got sha256:{}",
            expected, actual
        )))
    }
}

#[async_trait::async_trait]
impl StoreAdapter for FirefoxStore {
    fn name(&self) -> &str {
        "Firefox Add-ons"
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Firefox
    }

    fn supported_verbs(&self) -> &[Verb] {
        &[Verb::Status, Verb::Insert, Verb::Update, Verb::Sign]
    }

    async fn status(&self, request: &SubmissionRequest) -> Result<Outcome> {
        let body = self.addon_status(request.require_app_id()?).await?;
        Ok(Outcome::new(StoreKind::Firefox, Verb::Status, Payload::Raw(body)))
    }

    async fn insert(&self, request: &SubmissionRequest) -> Result<Outcome> {
        let report = self
            .insert_addon(request.require_archive()?, request.require_source()?)
            .await?;
        submission_outcome(Verb::Insert, report)
    }

    async fn update(&self, request: &SubmissionRequest) -> Result<Outcome> {
        let report = self
            .update_addon(request.require_archive()?, request.require_source()?)
            .await?;
        submission_outcome(Verb::Update, report)
    }

    async fn sign(&self, request: &SubmissionRequest) -> Result<Outcome> {
        let path = self.sign_addon(request.require_archive()?).await?;
        Ok(Outcome::new(StoreKind::Firefox, Verb::Sign, Payload::File(path)))
    }
}

fn submission_outcome(verb: Verb, report: SubmissionReport) -> Result<Outcome> {
    let warning = (!report.valid).then(|| match &report.validation_url {
        Some(url) => format!("validation reported errors, see {}", url),
        None => "validation reported errors".to_string(),
    });

    let mut outcome = Outcome::new(
        StoreKind::Firefox,
        verb,
        Payload::Json(serde_json::to_value(report)?),
    );
    if let Some(warning) = warning {
        outcome = outcome.with_warning(warning);
    }
    Ok(outcome)
}
