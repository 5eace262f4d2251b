//! Verb routing
//!
//! The orchestrator checks a [`SubmissionRequest`] against what the verb
//! needs before any network traffic, hands it to the registered adapter and
//! returns whatever comes back. Adapters are independent: nothing is shared
//! or coordinated between stores.

use crate::error::{Result, StoreError};
use crate::registry::StoreRegistry;
use crate::traits::StoreAdapter;
use crate::types::*;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Inputs a verb needs from the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Requirements {
    pub app_id: bool,
    pub archive: bool,
    pub source: bool,
}

impl Requirements {
    /// What `verb` needs for `store`
    ///
    /// Firefox reads the add-on ID from the manifest, so its archive verbs
    /// take no app ID.
    pub fn of(store: StoreKind, verb: Verb) -> Self {
        match (store, verb) {
            (_, Verb::Status) | (_, Verb::Publish) => Self {
                app_id: true,
                ..Self::default()
            },
            (StoreKind::Firefox, Verb::Insert) | (StoreKind::Firefox, Verb::Update) => Self {
                archive: true,
                source: true,
                ..Self::default()
            },
            (_, Verb::Insert) | (_, Verb::Sign) => Self {
                archive: true,
                ..Self::default()
            },
            (_, Verb::Update) => Self {
                app_id: true,
                archive: true,
                ..Self::default()
            },
        }
    }

    /// Check a request, including that named files exist
    pub async fn check(&self, request: &SubmissionRequest) -> Result<()> {
        if self.app_id {
            request.require_app_id()?;
        }
        if self.archive {
            existing_file(request.require_archive()?, "archive").await?;
        }
        if self.source {
            existing_file(request.require_source()?, "source archive").await?;
        }
        Ok(())
    }
}

async fn existing_file(path: &Path, what: &str) -> Result<()> {
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if is_file {
        Ok(())
    } else {
        Err(StoreError::InvalidRequest(format!(
            "{} {} does not exist",
            what,
            path.display()
        )))
    }
}

/// Routes verbs to store adapters
pub struct WorkflowOrchestrator {
    registry: StoreRegistry,
}

impl WorkflowOrchestrator {
    pub fn new(registry: StoreRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    /// Run one verb to its terminal outcome
    ///
    /// The first error from the adapter is returned unchanged.
    #[instrument(skip(self, request), fields(store = %request.store))]
    pub async fn run(&self, verb: Verb, request: &SubmissionRequest) -> Result<Outcome> {
        let adapter = self.registry.get(request.store).ok_or_else(|| {
            StoreError::ConfigurationError(format!("{} is not configured", request.store))
        })?;

        if !adapter.supports(verb) {
            return Err(adapter.unsupported(verb));
        }
        Requirements::of(request.store, verb).check(request).await?;

        info!("Running {} against {}", verb, adapter.name());
        let result = dispatch(adapter.as_ref(), verb, request).await;

        match &result {
            Ok(outcome) => info!(warnings = outcome.warnings.len(), "{} finished", verb),
            Err(e) => debug!(error = %e, "{} failed", verb),
        }
        result
    }
}

async fn dispatch(
    adapter: &dyn StoreAdapter,
    verb: Verb,
    request: &SubmissionRequest,
) -> Result<Outcome> {
    match verb {
        Verb::Status => adapter.status(request).await,
        Verb::Insert => adapter.insert(request).await,
        Verb::Update => adapter.update(request).await,
        Verb::Publish => adapter.publish(request).await,
        Verb::Sign => adapter.sign(request).await,
    }
}
