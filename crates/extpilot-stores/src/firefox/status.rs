//! Version status payloads and their normalization

use crate::poll::OperationStatus;
use serde::{Deserialize, Deserializer, Serialize};

/// `reviewed` flag of a version
///
/// AMO sends either a boolean or, once reviewed, a timestamp string. Any
/// non-empty string counts as reviewed; `null` and `""` do not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReviewedStatus(pub bool);

impl<'de> Deserialize<'de> for ReviewedStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Flag(flag)) => ReviewedStatus(flag),
            Some(Raw::Text(text)) => ReviewedStatus(!text.is_empty()),
            None => ReviewedStatus(false),
        })
    }
}

impl From<ReviewedStatus> for bool {
    fn from(status: ReviewedStatus) -> bool {
        status.0
    }
}

/// File attached to a version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionFile {
    pub download_url: String,
    /// `<algorithm>:<hex digest>`
    pub hash: Option<String>,
    pub signed: bool,
}

/// Upload and signing state of one add-on version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionStatus {
    pub guid: Option<String>,
    pub active: bool,
    pub automated_signing: bool,
    pub files: Vec<VersionFile>,
    pub passed_review: bool,
    pub pk: Option<String>,
    pub processed: bool,
    pub reviewed: ReviewedStatus,
    pub url: Option<String>,
    pub valid: bool,
    pub validation_url: Option<String>,
    pub version: Option<String>,
}

impl VersionStatus {
    /// Validation ran, valid or not
    pub fn validation(self) -> OperationStatus<VersionStatus> {
        if self.processed {
            OperationStatus::succeeded(self)
        } else {
            OperationStatus::pending(self)
        }
    }

    /// Will never be signed without a human looking at it
    pub fn requires_manual_review(&self) -> bool {
        self.valid && !self.automated_signing
    }

    /// Processed and rejected by the validator
    pub fn is_rejected(&self) -> bool {
        self.processed && !self.valid
    }

    /// Signed file ready to download
    pub fn is_signed(&self) -> bool {
        self.valid && self.active && self.reviewed.0 && !self.files.is_empty()
    }

    /// Signing progress
    pub fn signing(self) -> OperationStatus<VersionStatus> {
        if self.requires_manual_review() || self.is_rejected() {
            OperationStatus::failed(self)
        } else if self.is_signed() {
            OperationStatus::succeeded(self)
        } else {
            OperationStatus::pending(self)
        }
    }
}
