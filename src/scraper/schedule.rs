//! Periodic scrape scheduling
//!
//! One cycle at a time, bounded by the configured timeout. A failed or
//! timed-out cycle is logged and counted; the loop keeps going.

use super::RedisScraper;
use crate::client::StatusSource;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Run one bounded scrape cycle and publish its batch
///
/// Returns the number of data points published.
///
/// # Errors
///
/// Returns `ScrapeTimeout` if the cycle outlives `timeout`, the cycle's own
/// error if it aborted, or `Export` if the batch could not be published.
/// Every error is also reflected in `metrics` as a failed scrape.
pub async fn scrape_once<S: StatusSource>(
    scraper: &mut RedisScraper<S>,
    metrics: &Metrics,
    timeout: Duration,
) -> AppResult<usize> {
    let outcome = match tokio::time::timeout(timeout, scraper.scrape()).await {
        Ok(result) => result,
        Err(_) => Err(AppError::ScrapeTimeout {
            timeout_seconds: timeout.as_secs(),
        }),
    };

    let published = outcome.and_then(|batch| {
        metrics.record_parse_failures(&scraper.last_parse_failures());
        metrics.publish(&batch)?;
        Ok(batch.data_point_count())
    });

    if published.is_err() {
        metrics.scrape_failed();
    }
    published
}

/// Scrape forever on a fixed interval
///
/// The first cycle runs immediately. Ticks missed because a cycle ran long
/// are skipped rather than bunched up.
pub async fn run_scrape_loop<S: StatusSource>(
    mut scraper: RedisScraper<S>,
    metrics: Metrics,
    interval: Duration,
    timeout: Duration,
) {
    tracing::info!(
        interval_seconds = interval.as_secs(),
        timeout_seconds = timeout.as_secs(),
        "Starting scrape loop"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        match scrape_once(&mut scraper, &metrics, timeout).await {
            Ok(data_points) => {
                tracing::debug!(data_points, "Published scrape batch");
            }
            Err(e) if e.is_cycle_failure() => {
                tracing::error!(
                    error = %e,
                    "Scrape cycle failed, keeping previous start time"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to publish scrape batch");
            }
        }
    }
}
