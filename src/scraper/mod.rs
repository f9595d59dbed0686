//! Scrape orchestration
//!
//! `RedisScraper` runs one cycle per call: fetch a status snapshot, detect a
//! server restart from its uptime, then drive the common, keyspace and latency
//! recording passes into the `MetricsBuilder` and emit the batch.
//!
//! Per-field parse failures are logged and skipped. Only a failed fetch or an
//! unusable uptime aborts a cycle.

pub mod keyspace;
pub mod latency;
pub mod recorders;
pub mod schedule;

use crate::builder::{Metric, MetricsBatch, MetricsBuilder};
use crate::client::{RedisClient, StatusSource};
use crate::config::Config;
use crate::error::AppResult;
use std::collections::HashSet;
use std::time::{Duration, SystemTime};

pub use recorders::{Recorder, RecorderTable};

/// Recording pass within a scrape cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapePass {
    Common,
    Keyspace,
    Latency,
}

impl ScrapePass {
    pub const ALL: [ScrapePass; 3] = [ScrapePass::Common, ScrapePass::Keyspace, ScrapePass::Latency];

    /// Prometheus label value
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapePass::Common => "common",
            ScrapePass::Keyspace => "keyspace",
            ScrapePass::Latency => "latency",
        }
    }
}

/// Number of fields each pass skipped in the most recent cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseFailures {
    pub common: usize,
    pub keyspace: usize,
    pub latency: usize,
}

impl ParseFailures {
    pub fn get(&self, pass: ScrapePass) -> usize {
        match pass {
            ScrapePass::Common => self.common,
            ScrapePass::Keyspace => self.keyspace,
            ScrapePass::Latency => self.latency,
        }
    }

    pub fn total(&self) -> usize {
        self.common + self.keyspace + self.latency
    }
}

/// Periodic Redis `INFO` scraper
///
/// Holds the only state that survives between cycles: the last observed
/// uptime and the builder's start time. `scrape` takes `&mut self`, so one
/// instance can never run two cycles at once.
pub struct RedisScraper<S> {
    source: S,
    builder: MetricsBuilder,
    recorders: RecorderTable,
    last_uptime: Option<Duration>,
    last_failures: ParseFailures,
}

impl RedisScraper<RedisClient> {
    /// Build a scraper connected to the configured Redis endpoint
    ///
    /// # Errors
    ///
    /// Fails before any cycle runs if the TLS settings cannot be loaded or a
    /// disabled metric name is unknown.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let client = RedisClient::new(&config.redis)?;
        let disabled = config.metrics.disabled_metrics()?;
        Ok(Self::new(client, disabled))
    }
}

impl<S: StatusSource> RedisScraper<S> {
    pub fn new(source: S, disabled: HashSet<Metric>) -> Self {
        Self {
            source,
            builder: MetricsBuilder::new(disabled),
            recorders: RecorderTable::new(),
            last_uptime: None,
            last_failures: ParseFailures::default(),
        }
    }

    /// Uptime observed by the last successful cycle
    pub fn last_uptime(&self) -> Option<Duration> {
        self.last_uptime
    }

    /// Per-pass skipped fields of the last successful cycle
    pub fn last_parse_failures(&self) -> ParseFailures {
        self.last_failures
    }

    /// Start time currently stamped on cumulative sums
    pub fn start_time(&self) -> SystemTime {
        self.builder.start_time()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one scrape cycle against the wall clock
    pub async fn scrape(&mut self) -> AppResult<MetricsBatch> {
        self.scrape_at(SystemTime::now()).await
    }

    /// Run one scrape cycle, stamping every point with `now`
    ///
    /// # Errors
    ///
    /// Returns the fetch error or the uptime error unchanged. Nothing is
    /// recorded and the stored uptime is left untouched in that case.
    pub async fn scrape_at(&mut self, now: SystemTime) -> AppResult<MetricsBatch> {
        let info = self.source.fetch_status().await?;
        let uptime = info.uptime()?;

        if self.last_uptime.is_none_or(|last| uptime < last) {
            let start_time = now.checked_sub(uptime).unwrap_or(SystemTime::UNIX_EPOCH);
            tracing::info!(
                uptime_seconds = uptime.as_secs(),
                previous_uptime_seconds = self.last_uptime.map(|u| u.as_secs()),
                "Resetting metrics start time (first scrape or server restart)"
            );
            self.builder.reset(start_time);
        }

        let failures = ParseFailures {
            common: self.recorders.record_all(&info, &mut self.builder, now),
            keyspace: keyspace::record_keyspace(&info, &mut self.builder, now),
            latency: latency::record_latency_stats(&info, &mut self.builder, now),
        };

        self.last_uptime = Some(uptime);
        self.last_failures = failures;

        let batch = self.builder.emit();
        tracing::debug!(
            data_points = batch.data_point_count(),
            status_fields = info.len(),
            parse_failures = failures.total(),
            "Scrape cycle completed"
        );
        Ok(batch)
    }
}
