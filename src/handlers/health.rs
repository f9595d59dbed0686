//! Health check endpoint
//!
//! Provides a simple health check for monitoring and load balancers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Scrape status: "operational", "degraded" or "pending"
    pub scrape_status: &'static str,
}

/// Health check handler
///
/// Always returns 200 OK while the process is serving. `scrape_status` is
/// "degraded" when the most recent scrape cycle failed and "pending" until
/// the first cycle has finished.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let scrape_status = state.metrics().scrape_status().as_str();

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            scrape_status,
        }),
    )
}
