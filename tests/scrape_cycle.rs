//! Scrape cycle behavior through the public scraper API
//!
//! Covers the three recording passes end to end: flat fields, per-database
//! keyspace lines, and per-command latency percentiles.

mod common;

use common::{ScriptedSource, at, snapshot};
use rediscope::builder::{Metric, MetricKind, SCOPE_NAME, Value};
use rediscope::scraper::{ParseFailures, Recorder, RecorderTable, RedisScraper};
use std::collections::HashSet;

#[tokio::test]
async fn test_keyspace_and_latency_snapshot() {
    let info = snapshot(&[
        ("uptime_in_seconds", "100"),
        ("db0", "keys=1,expires=2,avg_ttl=3"),
        ("db1", "keys=4,expires=0,avg_ttl=0"),
        ("latency_percentiles_usec_get", "p50=1.5,p99=9.9"),
    ]);
    let mut scraper = RedisScraper::new(ScriptedSource::new(vec![Ok(info)]), HashSet::new());

    let batch = scraper.scrape_at(at(1_000)).await.unwrap();

    assert_eq!(batch.scope, SCOPE_NAME);
    for (db, keys, expires, avg_ttl) in [("0", 1, 2, 3), ("1", 4, 0, 0)] {
        assert_eq!(batch.find(Metric::DbKeys, "db", db).unwrap().value, Value::Int(keys));
        assert_eq!(
            batch.find(Metric::DbExpires, "db", db).unwrap().value,
            Value::Int(expires)
        );
        assert_eq!(
            batch.find(Metric::DbAvgTtl, "db", db).unwrap().value,
            Value::Int(avg_ttl)
        );
    }
    assert!(batch.find(Metric::DbKeys, "db", "2").is_none());

    let p50 = batch.find(Metric::LatencyStatP50, "command", "get").unwrap();
    let p99 = batch.find(Metric::LatencyStatP99, "command", "get").unwrap();
    assert_eq!(p50.value, Value::Double(1.5));
    assert_eq!(p99.value, Value::Double(9.9));
    assert_eq!(batch.points_for(Metric::LatencyStatP90).count(), 0);

    // uptime + 6 keyspace points + 2 latency points
    assert_eq!(batch.data_point_count(), 9);
}

#[tokio::test]
async fn test_common_pass_emits_one_point_per_known_field() {
    let table = RecorderTable::new();
    let mut fields: Vec<(&str, &str)> = table
        .iter()
        .map(|(field, recorder)| match recorder {
            Recorder::Int(_) => (field, "7"),
            Recorder::Double(_) => (field, "1.25"),
        })
        .collect();
    fields.push(("redis_version", "7.2.4"));
    fields.push(("role", "master"));
    let info = snapshot(&fields);
    let mut scraper = RedisScraper::new(ScriptedSource::new(vec![Ok(info)]), HashSet::new());

    let batch = scraper.scrape_at(at(1_000)).await.unwrap();

    assert_eq!(batch.data_point_count(), table.len());
    assert_eq!(scraper.last_parse_failures(), ParseFailures::default());
    assert_eq!(
        batch.find(Metric::CpuTime, "state", "user_children").unwrap().value,
        Value::Double(1.25)
    );
    assert_eq!(
        batch.points_for(Metric::MemoryFragmentationRatio).next().unwrap().value,
        Value::Double(1.25)
    );
    assert_eq!(
        batch.points_for(Metric::MemoryUsed).next().unwrap().value,
        Value::Int(7)
    );
}

#[tokio::test]
async fn test_keyspace_scan_stops_at_first_gap() {
    let info = snapshot(&[
        ("uptime_in_seconds", "100"),
        ("db0", "keys=1,expires=0,avg_ttl=0"),
        ("db1", "keys=2,expires=0,avg_ttl=0"),
        ("db7", "keys=3,expires=0,avg_ttl=0"),
    ]);
    let mut scraper = RedisScraper::new(ScriptedSource::new(vec![Ok(info)]), HashSet::new());

    let batch = scraper.scrape_at(at(1_000)).await.unwrap();

    assert_eq!(batch.points_for(Metric::DbKeys).count(), 2);
    assert!(batch.find(Metric::DbKeys, "db", "7").is_none());
}

#[tokio::test]
async fn test_malformed_keyspace_line_does_not_stop_scan() {
    let info = snapshot(&[
        ("uptime_in_seconds", "100"),
        ("db0", "keys=1,expires=0,avg_ttl=0"),
        ("db1", "garbage"),
        ("db2", "keys=3,expires=0,avg_ttl=0"),
    ]);
    let mut scraper = RedisScraper::new(ScriptedSource::new(vec![Ok(info)]), HashSet::new());

    let batch = scraper.scrape_at(at(1_000)).await.unwrap();

    assert_eq!(batch.points_for(Metric::DbKeys).count(), 2);
    assert!(batch.find(Metric::DbKeys, "db", "2").is_some());
    assert_eq!(scraper.last_parse_failures().keyspace, 1);
}

#[tokio::test]
async fn test_latency_fields_without_command_or_known_percentile() {
    let info = snapshot(&[
        ("uptime_in_seconds", "100"),
        ("latency_percentiles_usec_", "p50=1.0"),
        ("latency_percentiles_usec_set", "p50=2.0,p75=3.0,p99.9=4.0,p100=5.0"),
    ]);
    let mut scraper = RedisScraper::new(ScriptedSource::new(vec![Ok(info)]), HashSet::new());

    let batch = scraper.scrape_at(at(1_000)).await.unwrap();

    let latency_points: Vec<_> = batch
        .points
        .iter()
        .filter(|p| p.attribute("command").is_some())
        .collect();
    assert_eq!(latency_points.len(), 3);
    assert!(latency_points.iter().all(|p| p.attribute("command") == Some("set")));
    assert_eq!(
        batch.find(Metric::LatencyStatP999, "command", "set").unwrap().value,
        Value::Double(4.0)
    );
    assert_eq!(scraper.last_parse_failures().latency, 0);
}

#[tokio::test]
async fn test_sums_carry_start_time_and_gauges_do_not() {
    let info = snapshot(&[
        ("uptime_in_seconds", "100"),
        ("total_commands_processed", "50"),
        ("used_memory", "1024"),
    ]);
    let mut scraper = RedisScraper::new(ScriptedSource::new(vec![Ok(info)]), HashSet::new());

    let batch = scraper.scrape_at(at(1_000)).await.unwrap();

    for point in &batch.points {
        assert_eq!(point.timestamp, at(1_000));
        match point.metric.descriptor().kind {
            MetricKind::Sum { .. } => assert_eq!(point.start_time, Some(at(900))),
            MetricKind::Gauge => assert_eq!(point.start_time, None),
        }
    }
}

#[tokio::test]
async fn test_disabled_metrics_are_not_emitted() {
    let info = snapshot(&[
        ("uptime_in_seconds", "100"),
        ("used_memory", "1024"),
        ("db0", "keys=1,expires=0,avg_ttl=0"),
    ]);
    let disabled = HashSet::from([Metric::MemoryUsed, Metric::DbAvgTtl]);
    let mut scraper = RedisScraper::new(ScriptedSource::new(vec![Ok(info)]), disabled);

    let batch = scraper.scrape_at(at(1_000)).await.unwrap();

    assert_eq!(batch.points_for(Metric::MemoryUsed).count(), 0);
    assert_eq!(batch.points_for(Metric::DbAvgTtl).count(), 0);
    assert_eq!(batch.points_for(Metric::DbKeys).count(), 1);
}

#[tokio::test]
async fn test_each_cycle_emits_only_its_own_points() {
    let first = snapshot(&[("uptime_in_seconds", "100"), ("used_memory", "1024")]);
    let second = snapshot(&[("uptime_in_seconds", "110")]);
    let mut scraper =
        RedisScraper::new(ScriptedSource::new(vec![Ok(first), Ok(second)]), HashSet::new());

    let first_batch = scraper.scrape_at(at(1_000)).await.unwrap();
    let second_batch = scraper.scrape_at(at(1_010)).await.unwrap();

    assert_eq!(first_batch.data_point_count(), 2);
    assert_eq!(second_batch.data_point_count(), 1);
    assert_eq!(second_batch.points_for(Metric::MemoryUsed).count(), 0);
}
