//! rediscope - Redis INFO scraper with restart-aware metrics
//!
//! This library polls a Redis server's `INFO` output, turns it into typed
//! data points (gauges and cumulative sums anchored at the server start
//! time), and exposes them in Prometheus text format.

pub mod builder;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod scraper;
pub mod status;
pub mod telemetry;
