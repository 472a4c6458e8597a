//! Application state for the API server

use crate::{Config, TaskEngine};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the engine instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The task engine
    pub engine: Arc<TaskEngine>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(engine: Arc<TaskEngine>, config: Arc<Config>) -> Self {
        Self { engine, config }
    }
}
