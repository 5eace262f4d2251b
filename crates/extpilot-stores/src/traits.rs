//! Store adapter trait

use crate::error::{Result, StoreError};
use crate::types::*;

/// Trait for extension store adapters
///
/// Each verb drives the store's own pipeline to a terminal outcome. Stores
/// only override the verbs they offer; the rest answer
/// [`StoreError::Unsupported`].
#[async_trait::async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Get the store name
    fn name(&self) -> &str;

    /// Get the store kind
    fn kind(&self) -> StoreKind;

    /// Verbs this store implements
    fn supported_verbs(&self) -> &[Verb];

    fn supports(&self, verb: Verb) -> bool {
        self.supported_verbs().contains(&verb)
    }

    /// Error for a verb the store does not offer
    fn unsupported(&self, verb: Verb) -> StoreError {
        StoreError::Unsupported {
            store: self.name().to_string(),
            verb: verb.to_string(),
        }
    }

    /// Fetch the current listing
    async fn status(&self, _request: &SubmissionRequest) -> Result<Outcome> {
        Err(self.unsupported(Verb::Status))
    }

    /// Upload a package as a new item
    async fn insert(&self, _request: &SubmissionRequest) -> Result<Outcome> {
        Err(self.unsupported(Verb::Insert))
    }

    /// Upload a new version of an existing item
    async fn update(&self, _request: &SubmissionRequest) -> Result<Outcome> {
        Err(self.unsupported(Verb::Update))
    }

    /// Submit the item for publication
    async fn publish(&self, _request: &SubmissionRequest) -> Result<Outcome> {
        Err(self.unsupported(Verb::Publish))
    }

    /// Have the package signed and download the result
    async fn sign(&self, _request: &SubmissionRequest) -> Result<Outcome> {
        Err(self.unsupported(Verb::Sign))
    }
}
