use std::sync::Arc;

use meridian_runtime::MemoryService;

/// Shared state handed to every Axum handler: the one `MemoryService`
/// `meridian-runtime` builds at startup, cloned per request (cheap — just an
/// `Arc` bump).
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MemoryService>,
}

impl AppState {
    pub fn new(service: Arc<MemoryService>) -> Self {
        Self { service }
    }
}
