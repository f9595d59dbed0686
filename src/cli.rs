//! Command-line interface for rediscope
//!
//! Provides argument parsing and subcommand handling for the rediscope binary.

use clap::{Parser, Subcommand};

/// Redis INFO scraper with Prometheus exposition
#[derive(Parser)]
#[command(name = "rediscope")]
#[command(version)]
#[command(about = "Redis INFO scraper with Prometheus exposition")]
#[command(
    long_about = "rediscope polls a Redis server's INFO output on a fixed interval, \
    converts it into typed gauges and restart-aware cumulative sums, and serves \
    them in Prometheus text format."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# rediscope Configuration
# =======================
#
# This file configures the Redis connection, scrape schedule, exported
# metrics, the Prometheus exposition server, and logging.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port serving /metrics and /health
port = 9121

# ─────────────────────────────────────────────────────────────────────────────
# REDIS CONNECTION
# ─────────────────────────────────────────────────────────────────────────────

[redis]
# "host:port" for tcp, socket path for unix
endpoint = "localhost:6379"

# Transport: "tcp" or "unix"
transport = "tcp"

# Sent with AUTH before the first INFO when set
# password = "change-me"

# Seconds allowed for connecting (and TLS handshake)
connect_timeout_seconds = 5

# Enable TLS by uncommenting this table (tcp only).
# Without ca_file the platform trust store is used.
# [redis.tls]
# ca_file = "/etc/ssl/redis-ca.pem"
# server_name = "redis.internal"

# ─────────────────────────────────────────────────────────────────────────────
# SCRAPE SCHEDULE
# ─────────────────────────────────────────────────────────────────────────────

[scrape]
# Seconds between scrape cycles (1-3600)
collection_interval_seconds = 10

# Seconds a single cycle may take before it is abandoned (1-300, at most the interval)
timeout_seconds = 5

# ─────────────────────────────────────────────────────────────────────────────
# METRICS
# ─────────────────────────────────────────────────────────────────────────────

[metrics]
# Dotted metric names to drop, e.g. ["redis.latencystat.p100", "redis.cpu.time"]
disabled = []

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"
"#
}
