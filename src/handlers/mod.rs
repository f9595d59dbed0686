//! HTTP request handlers for the rediscope exposition server

use crate::metrics::Metrics;
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// The same `Metrics` instance is fed by the scrape loop.
#[derive(Clone)]
pub struct AppState {
    metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Get reference to the metrics registry
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Build the HTTP router with request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics::handler))
        .route("/health", get(health::handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appstate_shares_metrics() {
        let state = AppState::new(Arc::new(Metrics::new().unwrap()));
        let state2 = state.clone();
        state.metrics().scrape_failed();
        assert_eq!(state2.metrics().scrape_failures_count(), 1);
    }
}
