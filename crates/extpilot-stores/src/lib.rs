//! Browser extension store adapters for extpilot
//!
//! This crate drives extension submissions through the three big browser
//! extension stores behind one set of verbs: status, insert, update,
//! publish and sign.
//!
//! ## Supported Stores
//!
//! - **Chrome Web Store**: synchronous uploads, OAuth2 refresh token
//! - **Edge Add-ons**: asynchronous uploads polled to completion, OAuth2
//!   client credentials
//! - **Firefox Add-ons** (addons.mozilla.org): validation, source upload
//!   and signing pipelines, HS256 JWT
//!
//! ## Usage
//!
//! ```ignore
//! use extpilot_stores::{chrome::ChromeStore, StoreRegistry, WorkflowOrchestrator};
//!
//! let mut registry = StoreRegistry::new();
//! registry.register(ChromeStore::new(config, transport, clock)?);
//!
//! let orchestrator = WorkflowOrchestrator::new(registry);
//! let request = SubmissionRequest::new(StoreKind::Chrome).with_app_id(id);
//! let outcome = orchestrator.run(Verb::Status, &request).await?;
//! ```

pub mod archive;
pub mod auth;
pub mod clock;
pub mod error;
pub mod poll;
pub mod registry;
pub mod traits;
pub mod transport;
pub mod types;
pub mod workflow;

pub mod chrome;
pub mod edge;
pub mod firefox;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorKind, StoreError};
pub use poll::{OperationState, OperationStatus, PollDriver, PollPolicy};
pub use registry::StoreRegistry;
pub use traits::StoreAdapter;
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::*;
pub use workflow::WorkflowOrchestrator;
