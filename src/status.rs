//! Status snapshot returned by one `INFO` call
//!
//! Redis reports its status as `field:value` lines grouped under `# Section`
//! headers. `StatusInfo` flattens that report into a string map; all further
//! structure (keyspace lines, latency percentiles) stays encoded in the
//! values and is parsed by the scrape passes.

use crate::error::{AppError, AppResult};
use std::collections::HashMap;
use std::time::Duration;

/// Field carrying the server's uptime in whole seconds
pub const UPTIME_FIELD: &str = "uptime_in_seconds";

/// Immutable snapshot of the server's status fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusInfo {
    fields: HashMap<String, String>,
}

impl StatusInfo {
    /// Tokenize a raw `INFO` reply
    ///
    /// Blank lines and `#` section headers are skipped. Each remaining line is
    /// split at its first `:`; lines without one are ignored.
    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Self { fields }
    }

    /// Look up the raw value of a field
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Iterate over every `(field, value)` pair in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Server uptime
    ///
    /// # Errors
    ///
    /// Returns `UptimeMissing` if the field is absent and `UptimeInvalid` if it
    /// is not a non-negative integer.
    pub fn uptime(&self) -> AppResult<Duration> {
        let raw = self.get(UPTIME_FIELD).ok_or(AppError::UptimeMissing)?;
        let seconds = raw
            .trim()
            .parse::<u64>()
            .map_err(|e| AppError::UptimeInvalid {
                value: raw.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Duration::from_secs(seconds))
    }
}

impl<K, V> FromIterator<(K, V)> for StatusInfo
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for StatusInfo {
    fn from(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }
}
