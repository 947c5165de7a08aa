//! Application state for the web layer.

use std::sync::{Arc, Mutex};

use crate::reconcile::ReconcileConfig;
use crate::store::NetworkStore;

/// Store handle shared between requests. Passes lock it for their whole
/// duration, so at most one runs at a time.
pub type SharedStore = Arc<Mutex<dyn NetworkStore + Send>>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The persisted network
    pub store: SharedStore,

    /// Parameters for every reconciliation pass
    pub config: Arc<ReconcileConfig>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(store: impl NetworkStore + Send + 'static, config: ReconcileConfig) -> Self {
        let store: SharedStore = Arc::new(Mutex::new(store));
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
