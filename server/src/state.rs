//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the record store chosen at startup (Postgres when configured, the
//! in-memory fallback otherwise) and the page-size bounds for listings.

use std::sync::Arc;

use crate::config::PageLimits;
use crate::store::RecordStore;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub page_limits: PageLimits,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, page_limits: PageLimits) -> Self {
        Self { store, page_limits }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::resources::{self, Row};
    use crate::services::records;
    use crate::store::MemoryStore;

    /// Create a test `AppState` over an empty in-memory store.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), PageLimits::default())
    }

    /// Create a record through the service layer and return it in API form.
    pub async fn seed_record(state: &AppState, resource: &str, body: serde_json::Value) -> Row {
        let def = resources::lookup(resource).expect("seeded resource must be registered");
        records::create(state.store.as_ref(), def, body)
            .await
            .expect("seed record should insert")
    }
}
