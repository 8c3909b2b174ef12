pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ml::PredictionService;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub started_at: Instant,
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(service: Arc<PredictionService>) -> Self {
        Self {
            service,
            started_at: Instant::now(),
            metrics_enabled: true,
        }
    }

    /// Toggle the `/metrics` endpoint
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}
