//! Prometheus metrics endpoint
//!
//! Exposes the most recent scrape batch and the scraper's self-metrics in
//! Prometheus text format.

use axum::extract::State;

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;

/// Metrics handler for Prometheus scraping
///
/// # Response
///
/// - `200 OK` with metrics in Prometheus text format
/// - `500 Internal Server Error` with a JSON error body if encoding fails
///
/// # Example
///
/// ```bash
/// curl http://localhost:9121/metrics
/// # HELP redis_uptime Number of seconds since Redis server start (s)
/// # TYPE redis_uptime gauge
/// redis_uptime 3600
/// ```
pub async fn handler(State(state): State<AppState>) -> AppResult<String> {
    state.metrics().gather().map_err(|e| {
        tracing::error!(
            error = %e,
            "Failed to gather metrics for Prometheus scraping"
        );
        AppError::from(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Metric, MetricsBuilder};
    use crate::metrics::Metrics;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn create_test_state() -> AppState {
        AppState::new(Arc::new(Metrics::new().unwrap()))
    }

    #[tokio::test]
    async fn test_metrics_handler_returns_prometheus_format() {
        let state = create_test_state();
        let mut mb = MetricsBuilder::default();
        mb.record_int(Metric::Uptime, SystemTime::now(), 3600);
        state.metrics().publish(&mb.emit()).unwrap();

        let body = handler(State(state)).await.unwrap();

        assert!(body.contains("# HELP redis_uptime"));
        assert!(body.contains("# TYPE redis_uptime gauge"));
        assert!(body.contains("redis_uptime 3600"));
    }

    #[tokio::test]
    async fn test_metrics_handler_before_first_scrape() {
        let state = create_test_state();

        let body = handler(State(state)).await.unwrap();

        assert!(body.contains("rediscope_up -1"));
        assert!(!body.lines().any(|line| line.starts_with("redis_uptime ")));
    }

    #[tokio::test]
    async fn test_metrics_output_valid_prometheus_format() {
        let state = create_test_state();
        let ts = SystemTime::now();
        let mut mb = MetricsBuilder::default();
        mb.record_int(Metric::ClientsConnected, ts, 4);
        mb.record_db_keys(ts, 10, "0");
        mb.record_db_keys(ts, 3, "1");
        mb.record_latency(Metric::LatencyStatP999, ts, 12.5, "get");
        state.metrics().publish(&mb.emit()).unwrap();

        let body = handler(State(state)).await.unwrap();

        let metric_lines: Vec<&str> = body
            .lines()
            .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
            .collect();
        assert!(!metric_lines.is_empty());

        let mut seen = std::collections::HashSet::new();
        for line in metric_lines {
            let mut parts = line.split_whitespace();
            let series = parts.next().unwrap();
            let value = parts.next().unwrap();
            assert!(
                series.starts_with("redis_") || series.starts_with("rediscope_"),
                "Unexpected metric line: {}",
                line
            );
            assert!(value.parse::<f64>().is_ok(), "Non-numeric value: {}", line);
            assert!(seen.insert(series.to_string()), "Duplicate series: {}", series);
        }
        assert!(seen.contains("redis_db_keys{db=\"1\"}"));
        assert!(seen.contains("redis_latencystat_p99_9{command=\"get\"}"));
    }
}
