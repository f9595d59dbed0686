//! Typed data-point accumulation for one scrape cycle
//!
//! `MetricsBuilder` is the single sink every scrape pass records into. It
//! knows the full metric catalogue, drops points for disabled metrics, stamps
//! cumulative sums with the current start time, and hands the accumulated
//! points over as a `MetricsBatch` on `emit()`.

use std::collections::HashSet;
use std::time::SystemTime;

/// Instrumentation scope attached to every emitted batch
pub const SCOPE_NAME: &str = "rediscope";

/// How a metric's points should be interpreted downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    /// Cumulative sum since the builder's start time
    Sum { monotonic: bool },
}

/// Numeric type a metric is recorded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Double,
}

/// Static description of one metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
    pub kind: MetricKind,
    pub value_type: ValueType,
    pub attributes: &'static [&'static str],
}

/// Every metric this crate can emit
///
/// A closed set so label cardinality and names are fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    ClientsBlocked,
    ClientsConnected,
    ClientsMaxInputBuffer,
    ClientsMaxOutputBuffer,
    Commands,
    CommandsProcessed,
    ConnectionsReceived,
    ConnectionsRejected,
    CpuTime,
    DbAvgTtl,
    DbExpires,
    DbKeys,
    KeysEvicted,
    KeysExpired,
    KeyspaceHits,
    KeyspaceMisses,
    LatencyStatP50,
    LatencyStatP90,
    LatencyStatP99,
    LatencyStatP999,
    LatencyStatP100,
    LatestFork,
    MemoryFragmentationRatio,
    MemoryLua,
    MemoryPeak,
    MemoryRss,
    MemoryUsed,
    NetInput,
    NetOutput,
    RdbChangesSinceLastSave,
    ReplicationBacklogFirstByteOffset,
    ReplicationOffset,
    SlavesConnected,
    Uptime,
}

const NO_ATTRIBUTES: &[&str] = &[];
const DB_ATTRIBUTES: &[&str] = &["db"];
const COMMAND_ATTRIBUTES: &[&str] = &["command"];
const STATE_ATTRIBUTES: &[&str] = &["state"];

const fn gauge(
    name: &'static str,
    description: &'static str,
    unit: &'static str,
    value_type: ValueType,
    attributes: &'static [&'static str],
) -> MetricDescriptor {
    MetricDescriptor {
        name,
        description,
        unit,
        kind: MetricKind::Gauge,
        value_type,
        attributes,
    }
}

const fn sum(
    name: &'static str,
    description: &'static str,
    unit: &'static str,
    monotonic: bool,
    value_type: ValueType,
    attributes: &'static [&'static str],
) -> MetricDescriptor {
    MetricDescriptor {
        name,
        description,
        unit,
        kind: MetricKind::Sum { monotonic },
        value_type,
        attributes,
    }
}

impl Metric {
    pub const ALL: [Metric; 34] = [
        Metric::ClientsBlocked,
        Metric::ClientsConnected,
        Metric::ClientsMaxInputBuffer,
        Metric::ClientsMaxOutputBuffer,
        Metric::Commands,
        Metric::CommandsProcessed,
        Metric::ConnectionsReceived,
        Metric::ConnectionsRejected,
        Metric::CpuTime,
        Metric::DbAvgTtl,
        Metric::DbExpires,
        Metric::DbKeys,
        Metric::KeysEvicted,
        Metric::KeysExpired,
        Metric::KeyspaceHits,
        Metric::KeyspaceMisses,
        Metric::LatencyStatP50,
        Metric::LatencyStatP90,
        Metric::LatencyStatP99,
        Metric::LatencyStatP999,
        Metric::LatencyStatP100,
        Metric::LatestFork,
        Metric::MemoryFragmentationRatio,
        Metric::MemoryLua,
        Metric::MemoryPeak,
        Metric::MemoryRss,
        Metric::MemoryUsed,
        Metric::NetInput,
        Metric::NetOutput,
        Metric::RdbChangesSinceLastSave,
        Metric::ReplicationBacklogFirstByteOffset,
        Metric::ReplicationOffset,
        Metric::SlavesConnected,
        Metric::Uptime,
    ];

    pub fn descriptor(&self) -> MetricDescriptor {
        use ValueType::{Double, Int};
        match self {
            Metric::ClientsBlocked => sum(
                "redis.clients.blocked",
                "Number of clients pending on a blocking call",
                "{client}",
                false,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::ClientsConnected => sum(
                "redis.clients.connected",
                "Number of client connections (excluding connections from replicas)",
                "{client}",
                false,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::ClientsMaxInputBuffer => gauge(
                "redis.clients.max_input_buffer",
                "Biggest input buffer among current client connections",
                "By",
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::ClientsMaxOutputBuffer => gauge(
                "redis.clients.max_output_buffer",
                "Longest output list among current client connections",
                "By",
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::Commands => gauge(
                "redis.commands",
                "Number of commands processed per second",
                "{ops}/s",
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::CommandsProcessed => sum(
                "redis.commands.processed",
                "Total number of commands processed by the server",
                "{command}",
                true,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::ConnectionsReceived => sum(
                "redis.connections.received",
                "Total number of connections accepted by the server",
                "{connection}",
                true,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::ConnectionsRejected => sum(
                "redis.connections.rejected",
                "Number of connections rejected because of maxclients limit",
                "{connection}",
                true,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::CpuTime => sum(
                "redis.cpu.time",
                "System CPU consumed by the Redis server in seconds since server start",
                "s",
                true,
                Double,
                STATE_ATTRIBUTES,
            ),
            Metric::DbAvgTtl => gauge(
                "redis.db.avg_ttl",
                "Average keyspace keys TTL",
                "ms",
                Int,
                DB_ATTRIBUTES,
            ),
            Metric::DbExpires => gauge(
                "redis.db.expires",
                "Number of keyspace keys with an expiration",
                "{key}",
                Int,
                DB_ATTRIBUTES,
            ),
            Metric::DbKeys => gauge(
                "redis.db.keys",
                "Number of keyspace keys",
                "{key}",
                Int,
                DB_ATTRIBUTES,
            ),
            Metric::KeysEvicted => sum(
                "redis.keys.evicted",
                "Number of evicted keys due to maxmemory limit",
                "{key}",
                true,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::KeysExpired => sum(
                "redis.keys.expired",
                "Total number of key expiration events",
                "{event}",
                true,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::KeyspaceHits => sum(
                "redis.keyspace.hits",
                "Number of successful lookup of keys in the main dictionary",
                "{hit}",
                true,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::KeyspaceMisses => sum(
                "redis.keyspace.misses",
                "Number of failed lookup of keys in the main dictionary",
                "{miss}",
                true,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::LatencyStatP50 => gauge(
                "redis.latencystat.p50",
                "Median latency per command",
                "us",
                Double,
                COMMAND_ATTRIBUTES,
            ),
            Metric::LatencyStatP90 => gauge(
                "redis.latencystat.p90",
                "90th percentile latency per command",
                "us",
                Double,
                COMMAND_ATTRIBUTES,
            ),
            Metric::LatencyStatP99 => gauge(
                "redis.latencystat.p99",
                "99th percentile latency per command",
                "us",
                Double,
                COMMAND_ATTRIBUTES,
            ),
            Metric::LatencyStatP999 => gauge(
                "redis.latencystat.p99.9",
                "99.9th percentile latency per command",
                "us",
                Double,
                COMMAND_ATTRIBUTES,
            ),
            Metric::LatencyStatP100 => gauge(
                "redis.latencystat.p100",
                "Maximum latency per command",
                "us",
                Double,
                COMMAND_ATTRIBUTES,
            ),
            Metric::LatestFork => gauge(
                "redis.latest_fork",
                "Duration of the latest fork operation in microseconds",
                "us",
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::MemoryFragmentationRatio => gauge(
                "redis.memory.fragmentation_ratio",
                "Ratio between used_memory_rss and used_memory",
                "1",
                Double,
                NO_ATTRIBUTES,
            ),
            Metric::MemoryLua => gauge(
                "redis.memory.lua",
                "Number of bytes used by the Lua engine",
                "By",
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::MemoryPeak => gauge(
                "redis.memory.peak",
                "Peak memory consumed by Redis (in bytes)",
                "By",
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::MemoryRss => gauge(
                "redis.memory.rss",
                "Number of bytes that Redis allocated as seen by the operating system",
                "By",
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::MemoryUsed => gauge(
                "redis.memory.used",
                "Total number of bytes allocated by Redis using its allocator",
                "By",
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::NetInput => sum(
                "redis.net.input",
                "The total number of bytes read from the network",
                "By",
                true,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::NetOutput => sum(
                "redis.net.output",
                "The total number of bytes written to the network",
                "By",
                true,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::RdbChangesSinceLastSave => sum(
                "redis.rdb.changes_since_last_save",
                "Number of changes since the last dump",
                "{change}",
                false,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::ReplicationBacklogFirstByteOffset => gauge(
                "redis.replication.backlog_first_byte_offset",
                "The master offset of the replication backlog buffer",
                "By",
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::ReplicationOffset => gauge(
                "redis.replication.offset",
                "The server's current replication offset",
                "By",
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::SlavesConnected => sum(
                "redis.slaves.connected",
                "Number of connected replicas",
                "{replica}",
                false,
                Int,
                NO_ATTRIBUTES,
            ),
            Metric::Uptime => sum(
                "redis.uptime",
                "Number of seconds since Redis server start",
                "s",
                true,
                Int,
                NO_ATTRIBUTES,
            ),
        }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    /// Look up a metric by its dotted name
    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.name() == name)
    }
}

/// Value of a single data point
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Int(v) => v as f64,
            Value::Double(v) => v,
        }
    }
}

/// One recorded observation
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub metric: Metric,
    pub value: Value,
    /// Attribute values in the order of the descriptor's attribute keys
    pub attributes: Vec<String>,
    /// Set for cumulative sums only
    pub start_time: Option<SystemTime>,
    pub timestamp: SystemTime,
}

impl DataPoint {
    /// Value of the named attribute, if the metric carries it
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.metric
            .descriptor()
            .attributes
            .iter()
            .position(|k| *k == key)
            .and_then(|i| self.attributes.get(i))
            .map(String::as_str)
    }
}

/// Finished output of one scrape cycle
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsBatch {
    pub scope: &'static str,
    pub emitted_at: SystemTime,
    pub points: Vec<DataPoint>,
}

impl MetricsBatch {
    pub fn data_point_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All points recorded for `metric`, in recording order
    pub fn points_for(&self, metric: Metric) -> impl Iterator<Item = &DataPoint> {
        self.points.iter().filter(move |p| p.metric == metric)
    }

    /// The point for `metric` whose attribute `key` equals `value`
    pub fn find(&self, metric: Metric, key: &str, value: &str) -> Option<&DataPoint> {
        self.points_for(metric)
            .find(|p| p.attribute(key) == Some(value))
    }
}

/// Accumulates data points between two `emit()` calls
#[derive(Debug)]
pub struct MetricsBuilder {
    start_time: SystemTime,
    disabled: HashSet<Metric>,
    points: Vec<DataPoint>,
}

impl Default for MetricsBuilder {
    fn default() -> Self {
        Self::new(HashSet::new())
    }
}

impl MetricsBuilder {
    /// Create a builder that silently drops points for `disabled` metrics
    pub fn new(disabled: HashSet<Metric>) -> Self {
        Self {
            start_time: SystemTime::now(),
            disabled,
            points: Vec::new(),
        }
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn is_enabled(&self, metric: Metric) -> bool {
        !self.disabled.contains(&metric)
    }

    /// Re-baseline the start time stamped on cumulative sums
    pub fn reset(&mut self, start_time: SystemTime) {
        self.start_time = start_time;
    }

    pub fn record_int(&mut self, metric: Metric, ts: SystemTime, value: i64) {
        self.push(metric, ts, Value::Int(value), Vec::new());
    }

    pub fn record_double(&mut self, metric: Metric, ts: SystemTime, value: f64) {
        self.push(metric, ts, Value::Double(value), Vec::new());
    }

    pub fn record_cpu_time(&mut self, ts: SystemTime, seconds: f64, state: CpuState) {
        self.push(
            Metric::CpuTime,
            ts,
            Value::Double(seconds),
            vec![state.as_str().to_string()],
        );
    }

    pub fn record_db_keys(&mut self, ts: SystemTime, keys: i64, db: &str) {
        self.push(Metric::DbKeys, ts, Value::Int(keys), vec![db.to_string()]);
    }

    pub fn record_db_expires(&mut self, ts: SystemTime, expires: i64, db: &str) {
        self.push(Metric::DbExpires, ts, Value::Int(expires), vec![db.to_string()]);
    }

    pub fn record_db_avg_ttl(&mut self, ts: SystemTime, avg_ttl_ms: i64, db: &str) {
        self.push(Metric::DbAvgTtl, ts, Value::Int(avg_ttl_ms), vec![db.to_string()]);
    }

    /// Record one latency percentile; `metric` must be a `LatencyStat*` metric
    pub fn record_latency(&mut self, metric: Metric, ts: SystemTime, usec: f64, command: &str) {
        debug_assert_eq!(metric.descriptor().attributes, COMMAND_ATTRIBUTES);
        self.push(metric, ts, Value::Double(usec), vec![command.to_string()]);
    }

    /// Hand over everything recorded since the previous emit
    pub fn emit(&mut self) -> MetricsBatch {
        MetricsBatch {
            scope: SCOPE_NAME,
            emitted_at: SystemTime::now(),
            points: std::mem::take(&mut self.points),
        }
    }

    fn push(&mut self, metric: Metric, ts: SystemTime, value: Value, attributes: Vec<String>) {
        if !self.is_enabled(metric) {
            return;
        }
        let start_time = match metric.descriptor().kind {
            MetricKind::Sum { .. } => Some(self.start_time),
            MetricKind::Gauge => None,
        };
        self.points.push(DataPoint {
            metric,
            value,
            attributes,
            start_time,
            timestamp: ts,
        });
    }
}

/// CPU accounting bucket reported by Redis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Sys,
    SysChildren,
    User,
    UserChildren,
}

impl CpuState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuState::Sys => "sys",
            CpuState::SysChildren => "sys_children",
            CpuState::User => "user",
            CpuState::UserChildren => "user_children",
        }
    }
}
