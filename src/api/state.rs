//! Application state for the API server

use crate::{Config, Depot};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The depot serving every request
    pub depot: Arc<Depot>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(depot: Arc<Depot>, config: Arc<Config>) -> Self {
        Self { depot, config }
    }
}
