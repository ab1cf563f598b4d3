use std::sync::Arc;
use stowage_storage::LocalStorage;

/// Shared state for the file-serving routes.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<LocalStorage>,
}

impl AppState {
    pub fn new(storage: Arc<LocalStorage>) -> Self {
        Self { storage }
    }
}
