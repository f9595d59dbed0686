//! Per-database keyspace lines
//!
//! Redis reports one `db<N>` field per non-empty database, for example
//! `db0:keys=1,expires=2,avg_ttl=3`.

use crate::builder::MetricsBuilder;
use crate::error::ParseError;
use crate::status::StatusInfo;
use std::time::SystemTime;

/// Highest number of databases a Redis server can be configured with by default
pub const MAX_DATABASES: u32 = 16;

/// Parsed counts for one database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyspaceRecord {
    pub db: u32,
    pub keys: i64,
    pub expires: i64,
    /// Average TTL in milliseconds
    pub avg_ttl: i64,
}

/// Parse the value of a `db<N>` field
///
/// `keys`, `expires` and `avg_ttl` are required. Other well-formed pairs, such
/// as `subexpiry` on newer servers, are ignored.
pub fn parse_keyspace(db: u32, value: &str) -> Result<KeyspaceRecord, ParseError> {
    let mut keys = None;
    let mut expires = None;
    let mut avg_ttl = None;

    for pair in value.split(',') {
        let Some((name, raw)) = pair.split_once('=') else {
            return Err(ParseError::MalformedPair(pair.to_string()));
        };
        let slot = match name.trim() {
            "keys" => &mut keys,
            "expires" => &mut expires,
            "avg_ttl" => &mut avg_ttl,
            _ => continue,
        };
        let parsed = raw.trim().parse::<i64>().map_err(|e| ParseError::int(raw, e))?;
        *slot = Some(parsed);
    }

    Ok(KeyspaceRecord {
        db,
        keys: keys.ok_or(ParseError::MissingKeyspaceField("keys"))?,
        expires: expires.ok_or(ParseError::MissingKeyspaceField("expires"))?,
        avg_ttl: avg_ttl.ok_or(ParseError::MissingKeyspaceField("avg_ttl"))?,
    })
}

/// Record keys, expires and avg_ttl for every configured database
///
/// Databases are assumed to be numbered densely from 0, so the scan stops at
/// the first missing `db<N>` field; later fields are not looked at. A line
/// that fails to parse is logged and the scan moves on to the next index.
/// Returns the number of skipped lines.
pub fn record_keyspace(info: &StatusInfo, mb: &mut MetricsBuilder, ts: SystemTime) -> usize {
    let mut failures = 0;
    for db in 0..MAX_DATABASES {
        let key = format!("db{db}");
        let Some(raw) = info.get(&key) else {
            break;
        };
        let record = match parse_keyspace(db, raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    val = %raw,
                    error = %e,
                    "Failed to parse keyspace string"
                );
                failures += 1;
                continue;
            }
        };

        let db_label = record.db.to_string();
        mb.record_db_keys(ts, record.keys, &db_label);
        mb.record_db_expires(ts, record.expires, &db_label);
        mb.record_db_avg_ttl(ts, record.avg_ttl, &db_label);
    }
    failures
}
