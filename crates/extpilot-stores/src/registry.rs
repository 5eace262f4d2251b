//! Store adapter registry

use std::sync::Arc;
use tracing::debug;

use crate::traits::StoreAdapter;
use crate::types::StoreKind;

/// Registry of configured store adapters
///
/// Stores need credentials, so none are registered by default. At most one
/// adapter is kept per [`StoreKind`]; registering another replaces it.
pub struct StoreRegistry {
    stores: Vec<Arc<dyn StoreAdapter>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self { stores: Vec::new() }
    }

    /// Register a store adapter
    pub fn register<S: StoreAdapter + 'static>(&mut self, store: S) {
        self.register_arc(Arc::new(store));
    }

    /// Register a pre-built store adapter
    pub fn register_arc(&mut self, store: Arc<dyn StoreAdapter>) {
        let kind = store.kind();
        if let Some(existing) = self.stores.iter_mut().find(|s| s.kind() == kind) {
            debug!(store = %kind, "Replacing store adapter");
            *existing = store;
        } else {
            self.stores.push(store);
        }
    }

    /// Get the adapter for a store
    pub fn get(&self, kind: StoreKind) -> Option<Arc<dyn StoreAdapter>> {
        let result = self.stores.iter().find(|s| s.kind() == kind).cloned();
        debug!(store = %kind, found = result.is_some(), "Looking up store adapter");
        result
    }

    /// Get all registered store adapters
    pub fn all(&self) -> &[Arc<dyn StoreAdapter>] {
        &self.stores
    }

    /// Get names of all registered store adapters
    pub fn names(&self) -> Vec<String> {
        self.stores.iter().map(|s| s.name().to_string()).collect()
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}
