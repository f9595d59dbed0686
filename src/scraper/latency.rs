//! Per-command latency percentiles
//!
//! Redis 7+ reports one field per command in its `Latencystats` section:
//!
//! ```text
//! latency_percentiles_usec_get:p50=1.003,p99=3.007,p99.9=4.015
//! latency_percentiles_usec_config|get:p50=8.031,p99=27.007,p99.9=27.007
//! ```

use crate::builder::{Metric, MetricsBuilder};
use crate::error::ParseError;
use crate::status::StatusInfo;
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Prefix shared by every latency field; the remainder is the command name
pub const LATENCY_PREFIX: &str = "latency_percentiles_usec_";

/// Parsed percentiles for one command
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyStatsRecord {
    pub command: String,
    /// Percentile label without its `p` prefix ("50", "99.9", ...) → microseconds
    pub stats: BTreeMap<String, f64>,
}

/// Exported percentile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Percentile {
    P50,
    P90,
    P99,
    P999,
    P100,
}

impl Percentile {
    /// Match an exact label; anything else is not exported
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "50" => Some(Percentile::P50),
            "90" => Some(Percentile::P90),
            "99" => Some(Percentile::P99),
            "99.9" => Some(Percentile::P999),
            "100" => Some(Percentile::P100),
            _ => None,
        }
    }

    pub fn metric(&self) -> Metric {
        match self {
            Percentile::P50 => Metric::LatencyStatP50,
            Percentile::P90 => Metric::LatencyStatP90,
            Percentile::P99 => Metric::LatencyStatP99,
            Percentile::P999 => Metric::LatencyStatP999,
            Percentile::P100 => Metric::LatencyStatP100,
        }
    }
}

/// Parse `p50=<f>,p99=<f>,...` for `command`
///
/// Every pair must be `p<label>=<float>`; one bad pair fails the whole field.
/// Labels outside the exported set are kept here and dropped at record time.
pub fn parse_latency_stats(command: &str, value: &str) -> Result<LatencyStatsRecord, ParseError> {
    let mut stats = BTreeMap::new();
    for pair in value.split(',') {
        let Some((name, raw)) = pair.split_once('=') else {
            return Err(ParseError::MalformedPair(pair.to_string()));
        };
        let label = match name.strip_prefix('p') {
            Some(label) if !label.is_empty() => label,
            _ => return Err(ParseError::InvalidPercentileLabel(name.to_string())),
        };
        let latency = raw.parse::<f64>().map_err(|e| ParseError::float(raw, e))?;
        stats.insert(label.to_string(), latency);
    }

    Ok(LatencyStatsRecord {
        command: command.to_string(),
        stats,
    })
}

/// Record every latency field in `info`
///
/// A field named exactly [`LATENCY_PREFIX`] has no command and is skipped.
/// Returns the number of fields that failed to parse.
pub fn record_latency_stats(info: &StatusInfo, mb: &mut MetricsBuilder, ts: SystemTime) -> usize {
    let mut failures = 0;
    for (key, raw) in info.iter() {
        let command = match key.strip_prefix(LATENCY_PREFIX) {
            Some(command) if !command.is_empty() => command,
            _ => continue,
        };
        let record = match parse_latency_stats(command, raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    command = %command,
                    latencystats = %raw,
                    error = %e,
                    "Failed to parse latency stats string"
                );
                failures += 1;
                continue;
            }
        };

        for (label, latency) in &record.stats {
            match Percentile::from_label(label) {
                Some(percentile) => {
                    mb.record_latency(percentile.metric(), ts, *latency, &record.command)
                }
                None => tracing::trace!(
                    command = %record.command,
                    percentile = %label,
                    "Dropping unexported latency percentile"
                ),
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Value;

    #[test]
    fn test_parse_latency_stats_line() {
        let record = parse_latency_stats("get", "p50=1.5,p99=9.9,p99.9=12.25").unwrap();
        assert_eq!(record.command, "get");
        assert_eq!(record.stats.len(), 3);
        assert_eq!(record.stats["50"], 1.5);
        assert_eq!(record.stats["99.9"], 12.25);
    }

    #[test]
    fn test_parse_latency_stats_keeps_unknown_labels() {
        let record = parse_latency_stats("set", "p75=3.0").unwrap();
        assert_eq!(record.stats["75"], 3.0);
    }

    #[test]
    fn test_parse_latency_stats_rejects_bad_float() {
        let err = parse_latency_stats("get", "p50=1.5,p99=fast").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFloat { .. }));
    }

    #[test]
    fn test_parse_latency_stats_rejects_label_without_p() {
        let err = parse_latency_stats("get", "50=1.5").unwrap_err();
        assert_eq!(err, ParseError::InvalidPercentileLabel("50".to_string()));

        let err = parse_latency_stats("get", "p=1.5").unwrap_err();
        assert_eq!(err, ParseError::InvalidPercentileLabel("p".to_string()));
    }

    #[test]
    fn test_parse_latency_stats_rejects_empty_value() {
        assert!(parse_latency_stats("get", "").is_err());
    }

    #[test]
    fn test_percentile_labels_are_exact() {
        assert_eq!(Percentile::from_label("99.9"), Some(Percentile::P999));
        assert_eq!(Percentile::from_label("99.90"), None);
        assert_eq!(Percentile::from_label("p50"), None);
        assert_eq!(Percentile::P100.metric(), Metric::LatencyStatP100);
    }

    #[test]
    fn test_record_latency_stats_tags_command() {
        let info: StatusInfo = [
            ("latency_percentiles_usec_get", "p50=1.5,p99=9.9"),
            ("latency_percentiles_usec_config|get", "p100=20"),
        ]
        .into_iter()
        .collect();

        let mut mb = MetricsBuilder::default();
        assert_eq!(record_latency_stats(&info, &mut mb, SystemTime::now()), 0);
        let batch = mb.emit();

        assert_eq!(batch.data_point_count(), 3);
        assert_eq!(
            batch
                .find(Metric::LatencyStatP50, "command", "get")
                .unwrap()
                .value,
            Value::Double(1.5)
        );
        assert_eq!(
            batch
                .find(Metric::LatencyStatP100, "command", "config|get")
                .unwrap()
                .value,
            Value::Double(20.0)
        );
    }

    #[test]
    fn test_record_latency_stats_skips_bare_prefix() {
        let info: StatusInfo = [(LATENCY_PREFIX, "p50=1.0")].into_iter().collect();

        let mut mb = MetricsBuilder::default();
        assert_eq!(record_latency_stats(&info, &mut mb, SystemTime::now()), 0);
        assert!(mb.emit().is_empty());
    }

    #[test]
    fn test_record_latency_stats_drops_unknown_percentile_only() {
        let info: StatusInfo = [("latency_percentiles_usec_get", "p50=1.0,p75=2.0,p99=3.0")]
            .into_iter()
            .collect();

        let mut mb = MetricsBuilder::default();
        record_latency_stats(&info, &mut mb, SystemTime::now());
        let batch = mb.emit();

        assert_eq!(batch.data_point_count(), 2);
        assert!(batch.find(Metric::LatencyStatP50, "command", "get").is_some());
        assert!(batch.find(Metric::LatencyStatP99, "command", "get").is_some());
    }

    #[test]
    fn test_record_latency_stats_skips_bad_field_and_continues() {
        let info: StatusInfo = [
            ("latency_percentiles_usec_get", "p50=oops"),
            ("latency_percentiles_usec_set", "p90=4.5"),
        ]
        .into_iter()
        .collect();

        let mut mb = MetricsBuilder::default();
        let failures = record_latency_stats(&info, &mut mb, SystemTime::now());
        let batch = mb.emit();

        assert_eq!(failures, 1);
        assert_eq!(batch.data_point_count(), 1);
        assert!(batch.find(Metric::LatencyStatP90, "command", "set").is_some());
    }

    #[test]
    fn test_record_latency_stats_ignores_other_fields() {
        let info: StatusInfo = [("latency_tracking", "yes"), ("used_memory", "1")]
            .into_iter()
            .collect();

        let mut mb = MetricsBuilder::default();
        assert_eq!(record_latency_stats(&info, &mut mb, SystemTime::now()), 0);
        assert!(mb.emit().is_empty());
    }
}
