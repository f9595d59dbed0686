//! Prometheus exposition for scraped Redis metrics
//!
//! This module owns the registry served on `/metrics`. It holds:
//! - One gauge family per catalogue metric, refreshed from each emitted batch
//! - Self-metrics describing the scraper's own health
//!
//! Every batch fully replaces the previous one, so per-database and
//! per-command series that disappear from `INFO` also disappear here.

use crate::builder::{Metric, MetricsBatch};
use crate::scraper::{ParseFailures, ScrapePass};
use prometheus::{
    Encoder, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Outcome of the most recent scrape cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStatus {
    /// No cycle has finished yet
    Pending,
    Operational,
    Degraded,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Pending => "pending",
            ScrapeStatus::Operational => "operational",
            ScrapeStatus::Degraded => "degraded",
        }
    }
}

/// Prometheus name for a dotted catalogue name
///
/// `redis.latencystat.p99.9` becomes `redis_latencystat_p99_9`.
pub fn prometheus_name(metric: Metric) -> String {
    metric.name().replace('.', "_")
}

/// Metrics registry for rediscope
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    series: Arc<BTreeMap<Metric, GaugeVec>>,
    // Held for writing while a batch replaces the series, for reading
    // while the registry is encoded
    exposition: Arc<RwLock<()>>,
    scrapes_total: IntCounter,
    scrape_failures: IntCounter,
    field_parse_failures: IntCounterVec,
    last_scrape_data_points: IntGauge,
    up: IntGauge,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers one gauge family per catalogue metric plus the self-metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let mut series = BTreeMap::new();
        for metric in Metric::ALL {
            let descriptor = metric.descriptor();
            let gauge = GaugeVec::new(
                Opts::new(
                    prometheus_name(metric),
                    format!("{} ({})", descriptor.description, descriptor.unit),
                ),
                descriptor.attributes,
            )?;
            registry.register(Box::new(gauge.clone()))?;
            series.insert(metric, gauge);
        }

        let scrapes_total = IntCounter::with_opts(Opts::new(
            "rediscope_scrapes_total",
            "Total number of successful scrape cycles",
        ))?;

        // Alert on a sustained increase: the server is unreachable or its
        // INFO reply lacks a usable uptime
        let scrape_failures = IntCounter::with_opts(Opts::new(
            "rediscope_scrape_failures_total",
            "Total number of scrape cycles aborted by a fetch or uptime failure",
        ))?;

        // Labels:
        // - pass: common, keyspace, latency
        //
        // Cardinality: 3 time series
        let field_parse_failures = IntCounterVec::new(
            Opts::new(
                "rediscope_field_parse_failures_total",
                "Total number of INFO fields skipped because their value could not be parsed, by recording pass",
            ),
            &["pass"],
        )?;

        let last_scrape_data_points = IntGauge::with_opts(Opts::new(
            "rediscope_last_scrape_data_points",
            "Number of data points produced by the most recent successful scrape",
        ))?;

        let up = IntGauge::with_opts(Opts::new(
            "rediscope_up",
            "1 if the most recent scrape succeeded, 0 if it failed, -1 before the first scrape",
        ))?;
        up.set(-1);

        registry.register(Box::new(scrapes_total.clone()))?;
        registry.register(Box::new(scrape_failures.clone()))?;
        registry.register(Box::new(field_parse_failures.clone()))?;
        registry.register(Box::new(last_scrape_data_points.clone()))?;
        registry.register(Box::new(up.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            series: Arc::new(series),
            exposition: Arc::new(RwLock::new(())),
            scrapes_total,
            scrape_failures,
            field_parse_failures,
            last_scrape_data_points,
            up,
        })
    }

    /// Replace every exported Redis series with the contents of `batch`
    ///
    /// The swap is atomic with respect to `gather`: a concurrent reader sees
    /// either the previous batch or this one.
    ///
    /// # Errors
    ///
    /// Returns an error if a point's attribute count does not match its
    /// metric's label names. The previous series are left in place.
    pub fn publish(&self, batch: &MetricsBatch) -> Result<(), prometheus::Error> {
        for point in &batch.points {
            let expect = point.metric.descriptor().attributes.len();
            if point.attributes.len() != expect {
                return Err(prometheus::Error::InconsistentCardinality {
                    expect,
                    got: point.attributes.len(),
                });
            }
        }

        let _guard = self
            .exposition
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        for gauge in self.series.values() {
            gauge.reset();
        }

        for point in &batch.points {
            let Some(gauge) = self.series.get(&point.metric) else {
                continue;
            };
            let labels: Vec<&str> = point.attributes.iter().map(String::as_str).collect();
            gauge
                .get_metric_with_label_values(&labels)?
                .set(point.value.as_f64());
        }

        self.scrapes_total.inc();
        self.last_scrape_data_points
            .set(i64::try_from(batch.data_point_count()).unwrap_or(i64::MAX));
        self.up.set(1);
        Ok(())
    }

    /// Record an aborted scrape cycle
    pub fn scrape_failed(&self) {
        self.scrape_failures.inc();
        self.up.set(0);
    }

    /// Add the per-pass skipped fields of one cycle
    pub fn record_parse_failures(&self, failures: &ParseFailures) {
        for pass in ScrapePass::ALL {
            let count = failures.get(pass);
            if count > 0 {
                self.field_parse_failures
                    .with_label_values(&[pass.as_str()])
                    .inc_by(count as u64);
            }
        }
    }

    pub fn scrapes_count(&self) -> u64 {
        self.scrapes_total.get()
    }

    pub fn scrape_failures_count(&self) -> u64 {
        self.scrape_failures.get()
    }

    pub fn field_parse_failures_count(&self, pass: ScrapePass) -> u64 {
        self.field_parse_failures
            .with_label_values(&[pass.as_str()])
            .get()
    }

    pub fn scrape_status(&self) -> ScrapeStatus {
        match self.up.get() {
            1 => ScrapeStatus::Operational,
            0 => ScrapeStatus::Degraded,
            _ => ScrapeStatus::Pending,
        }
    }

    /// Gather all metrics in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the output is not valid UTF-8.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = {
            let _guard = self
                .exposition
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            self.registry.gather()
        };
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Metrics output is not valid UTF-8: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{CpuState, MetricsBuilder};
    use std::time::SystemTime;

    fn batch_with<F: FnOnce(&mut MetricsBuilder)>(record: F) -> MetricsBatch {
        let mut mb = MetricsBuilder::default();
        record(&mut mb);
        mb.emit()
    }

    #[test]
    fn test_metrics_new_registers_catalogue() {
        let metrics = Metrics::new().expect("Failed to create test metrics");
        assert_eq!(metrics.series.len(), Metric::ALL.len());
        assert_eq!(metrics.scrape_status(), ScrapeStatus::Pending);
    }

    #[test]
    fn test_prometheus_name_replaces_dots() {
        assert_eq!(
            prometheus_name(Metric::LatencyStatP999),
            "redis_latencystat_p99_9"
        );
        assert_eq!(prometheus_name(Metric::MemoryUsed), "redis_memory_used");
    }

    #[test]
    fn test_publish_exports_points_with_labels() {
        let metrics = Metrics::new().unwrap();
        let ts = SystemTime::now();
        let batch = batch_with(|mb| {
            mb.record_int(Metric::MemoryUsed, ts, 2048);
            mb.record_db_keys(ts, 12, "0");
            mb.record_latency(Metric::LatencyStatP50, ts, 1.5, "get");
            mb.record_cpu_time(ts, 0.75, CpuState::Sys);
        });

        metrics.publish(&batch).unwrap();
        let output = metrics.gather().unwrap();

        assert!(output.contains("redis_memory_used 2048"));
        assert!(output.contains("redis_db_keys{db=\"0\"} 12"));
        assert!(output.contains("redis_latencystat_p50{command=\"get\"} 1.5"));
        assert!(output.contains("redis_cpu_time{state=\"sys\"} 0.75"));
        assert!(output.contains("rediscope_last_scrape_data_points 4"));
        assert_eq!(metrics.scrapes_count(), 1);
        assert_eq!(metrics.scrape_status(), ScrapeStatus::Operational);
    }

    #[test]
    fn test_publish_drops_series_missing_from_new_batch() {
        let metrics = Metrics::new().unwrap();
        let ts = SystemTime::now();

        metrics
            .publish(&batch_with(|mb| {
                mb.record_latency(Metric::LatencyStatP99, ts, 3.0, "set");
            }))
            .unwrap();
        metrics
            .publish(&batch_with(|mb| {
                mb.record_latency(Metric::LatencyStatP99, ts, 4.0, "get");
            }))
            .unwrap();

        let output = metrics.gather().unwrap();
        assert!(output.contains("command=\"get\""));
        assert!(!output.contains("command=\"set\""));
    }

    #[test]
    fn test_rejected_batch_keeps_previous_series() {
        let metrics = Metrics::new().unwrap();
        let ts = SystemTime::now();
        metrics
            .publish(&batch_with(|mb| mb.record_db_keys(ts, 12, "0")))
            .unwrap();

        let mut bad = batch_with(|mb| mb.record_int(Metric::MemoryUsed, ts, 1));
        bad.points[0].attributes.push("extra".to_string());
        let err = metrics.publish(&bad).unwrap_err();

        assert!(matches!(
            err,
            prometheus::Error::InconsistentCardinality { expect: 0, got: 1 }
        ));
        let output = metrics.gather().unwrap();
        assert!(output.contains("redis_db_keys{db=\"0\"} 12"));
        assert!(!output.lines().any(|l| l.starts_with("redis_memory_used ")));
        assert_eq!(metrics.scrapes_count(), 1);
    }

    #[test]
    fn test_gather_never_sees_half_published_batch() {
        use std::thread;

        let metrics = Metrics::new().unwrap();
        let ts = SystemTime::now();
        let batch = batch_with(|mb| {
            mb.record_int(Metric::ClientsConnected, ts, 3);
            mb.record_db_keys(ts, 12, "0");
        });
        metrics.publish(&batch).unwrap();

        let writer = {
            let metrics = metrics.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    metrics.publish(&batch).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let output = metrics.gather().unwrap();
            assert!(output.contains("redis_clients_connected 3"));
            assert!(output.contains("redis_db_keys{db=\"0\"} 12"));
        }
        writer.join().expect("Thread should not panic");
    }

    #[test]
    fn test_scrape_failed_marks_degraded() {
        let metrics = Metrics::new().unwrap();
        metrics.scrape_failed();

        assert_eq!(metrics.scrape_failures_count(), 1);
        assert_eq!(metrics.scrape_status(), ScrapeStatus::Degraded);
        assert!(metrics.gather().unwrap().contains("rediscope_up 0"));
    }

    #[test]
    fn test_parse_failures_counted_per_pass() {
        let metrics = Metrics::new().unwrap();
        metrics.record_parse_failures(&ParseFailures {
            common: 2,
            keyspace: 0,
            latency: 1,
        });

        assert_eq!(metrics.field_parse_failures_count(ScrapePass::Common), 2);
        assert_eq!(metrics.field_parse_failures_count(ScrapePass::Keyspace), 0);
        assert_eq!(metrics.field_parse_failures_count(ScrapePass::Latency), 1);
    }

    #[test]
    fn test_metrics_is_clonable() {
        let metrics = Metrics::new().unwrap();
        let clone = metrics.clone();
        clone.scrape_failed();
        assert_eq!(metrics.scrape_failures_count(), 1);
    }

    #[test]
    fn test_concurrent_publish_and_gather() {
        use std::thread;

        let metrics = Arc::new(Metrics::new().unwrap());
        let mut handles = vec![];

        for i in 0..8 {
            let m = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                let ts = SystemTime::now();
                let batch = batch_with(|mb| mb.record_int(Metric::ClientsConnected, ts, i));
                m.publish(&batch).expect("publish should succeed");
                m.gather().expect("gather should succeed");
            }));
        }

        for handle in handles {
            handle.join().expect("Thread should not panic");
        }
        assert_eq!(metrics.scrapes_count(), 8);
    }
}
