//! Field-name → recorder table for the flat `INFO` fields
//!
//! The status protocol only carries text, so the numeric kind of a field is
//! known from its recorder, not from its value. Each entry declares whether
//! the value is parsed as `i64` or `f64` before it reaches the builder.

use crate::builder::{CpuState, Metric, MetricsBuilder};
use crate::error::ParseError;
use crate::status::StatusInfo;
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Typed recording function for one status field
#[derive(Clone, Copy)]
pub enum Recorder {
    Int(fn(&mut MetricsBuilder, SystemTime, i64)),
    Double(fn(&mut MetricsBuilder, SystemTime, f64)),
}

impl Recorder {
    /// Parse `raw` according to this recorder's kind and record it
    ///
    /// Surrounding whitespace is ignored. Nothing is recorded when parsing
    /// fails.
    pub fn record(
        &self,
        mb: &mut MetricsBuilder,
        ts: SystemTime,
        raw: &str,
    ) -> Result<(), ParseError> {
        let raw = raw.trim();
        match self {
            Recorder::Int(record) => {
                let value = raw.parse::<i64>().map_err(|e| ParseError::int(raw, e))?;
                record(mb, ts, value);
            }
            Recorder::Double(record) => {
                let value = raw.parse::<f64>().map_err(|e| ParseError::float(raw, e))?;
                record(mb, ts, value);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recorder::Int(_) => f.write_str("Recorder::Int"),
            Recorder::Double(_) => f.write_str("Recorder::Double"),
        }
    }
}

/// Static mapping from known `INFO` fields to their recorders
#[derive(Debug, Clone)]
pub struct RecorderTable {
    entries: BTreeMap<&'static str, Recorder>,
}

impl Default for RecorderTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderTable {
    /// Build the table of every flat field this crate exports
    #[rustfmt::skip]
    pub fn new() -> Self {
        let entries: [(&'static str, Recorder); 29] = [
            ("blocked_clients", Recorder::Int(|mb, ts, v| mb.record_int(Metric::ClientsBlocked, ts, v))),
            ("client_recent_max_input_buffer", Recorder::Int(|mb, ts, v| mb.record_int(Metric::ClientsMaxInputBuffer, ts, v))),
            ("client_recent_max_output_buffer", Recorder::Int(|mb, ts, v| mb.record_int(Metric::ClientsMaxOutputBuffer, ts, v))),
            ("connected_clients", Recorder::Int(|mb, ts, v| mb.record_int(Metric::ClientsConnected, ts, v))),
            ("connected_slaves", Recorder::Int(|mb, ts, v| mb.record_int(Metric::SlavesConnected, ts, v))),
            ("evicted_keys", Recorder::Int(|mb, ts, v| mb.record_int(Metric::KeysEvicted, ts, v))),
            ("expired_keys", Recorder::Int(|mb, ts, v| mb.record_int(Metric::KeysExpired, ts, v))),
            ("instantaneous_ops_per_sec", Recorder::Int(|mb, ts, v| mb.record_int(Metric::Commands, ts, v))),
            ("keyspace_hits", Recorder::Int(|mb, ts, v| mb.record_int(Metric::KeyspaceHits, ts, v))),
            ("keyspace_misses", Recorder::Int(|mb, ts, v| mb.record_int(Metric::KeyspaceMisses, ts, v))),
            ("latest_fork_usec", Recorder::Int(|mb, ts, v| mb.record_int(Metric::LatestFork, ts, v))),
            ("master_repl_offset", Recorder::Int(|mb, ts, v| mb.record_int(Metric::ReplicationOffset, ts, v))),
            ("mem_fragmentation_ratio", Recorder::Double(|mb, ts, v| mb.record_double(Metric::MemoryFragmentationRatio, ts, v))),
            ("rdb_changes_since_last_save", Recorder::Int(|mb, ts, v| mb.record_int(Metric::RdbChangesSinceLastSave, ts, v))),
            ("rejected_connections", Recorder::Int(|mb, ts, v| mb.record_int(Metric::ConnectionsRejected, ts, v))),
            ("repl_backlog_first_byte_offset", Recorder::Int(|mb, ts, v| mb.record_int(Metric::ReplicationBacklogFirstByteOffset, ts, v))),
            ("total_commands_processed", Recorder::Int(|mb, ts, v| mb.record_int(Metric::CommandsProcessed, ts, v))),
            ("total_connections_received", Recorder::Int(|mb, ts, v| mb.record_int(Metric::ConnectionsReceived, ts, v))),
            ("total_net_input_bytes", Recorder::Int(|mb, ts, v| mb.record_int(Metric::NetInput, ts, v))),
            ("total_net_output_bytes", Recorder::Int(|mb, ts, v| mb.record_int(Metric::NetOutput, ts, v))),
            ("uptime_in_seconds", Recorder::Int(|mb, ts, v| mb.record_int(Metric::Uptime, ts, v))),
            ("used_cpu_sys", Recorder::Double(|mb, ts, v| mb.record_cpu_time(ts, v, CpuState::Sys))),
            ("used_cpu_sys_children", Recorder::Double(|mb, ts, v| mb.record_cpu_time(ts, v, CpuState::SysChildren))),
            ("used_cpu_user", Recorder::Double(|mb, ts, v| mb.record_cpu_time(ts, v, CpuState::User))),
            ("used_cpu_user_children", Recorder::Double(|mb, ts, v| mb.record_cpu_time(ts, v, CpuState::UserChildren))),
            ("used_memory", Recorder::Int(|mb, ts, v| mb.record_int(Metric::MemoryUsed, ts, v))),
            ("used_memory_lua", Recorder::Int(|mb, ts, v| mb.record_int(Metric::MemoryLua, ts, v))),
            ("used_memory_peak", Recorder::Int(|mb, ts, v| mb.record_int(Metric::MemoryPeak, ts, v))),
            ("used_memory_rss", Recorder::Int(|mb, ts, v| mb.record_int(Metric::MemoryRss, ts, v))),
        ];

        Self {
            entries: BTreeMap::from(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Recorder> {
        self.entries.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Recorder)> {
        self.entries.iter().map(|(field, recorder)| (*field, recorder))
    }

    /// Record every known field present in `info`
    ///
    /// Fields without an entry are ignored. A value that does not parse as the
    /// recorder's numeric kind is logged and skipped. Returns the number of
    /// skipped fields.
    pub fn record_all(&self, info: &StatusInfo, mb: &mut MetricsBuilder, ts: SystemTime) -> usize {
        let mut failures = 0;
        for (field, recorder) in self.iter() {
            let Some(raw) = info.get(field) else {
                continue;
            };
            if let Err(e) = recorder.record(mb, ts, raw) {
                tracing::warn!(
                    key = %field,
                    val = %raw,
                    error = %e,
                    "Failed to parse info value, skipping field"
                );
                failures += 1;
            }
        }
        failures
    }
}
