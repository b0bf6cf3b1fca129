use std::sync::Arc;

use crate::engine_client::RoadmapEngine;
use crate::profile::store::ProfileStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable store. Postgres in production, in-memory for local runs and tests.
    pub store: Arc<dyn ProfileStore>,
    pub engine: Arc<dyn RoadmapEngine>,
}
