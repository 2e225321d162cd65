//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use docshift_core::JobRuntime;

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Task registry, workspaces, dispatcher and in-flight workers.
    pub jobs: JobRuntime,
}
