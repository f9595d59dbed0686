//! Shared helpers for scraper integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rediscope::client::StatusSource;
use rediscope::error::{AppError, AppResult};
use rediscope::status::StatusInfo;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

/// Replays a fixed sequence of fetch results, then fails
pub struct ScriptedSource {
    replies: VecDeque<AppResult<StatusInfo>>,
}

impl ScriptedSource {
    pub fn new(replies: Vec<AppResult<StatusInfo>>) -> Self {
        Self {
            replies: replies.into(),
        }
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(&mut self) -> AppResult<StatusInfo> {
        self.replies
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Internal("script exhausted".to_string())))
    }
}

pub fn snapshot(fields: &[(&str, &str)]) -> StatusInfo {
    fields.iter().map(|(k, v)| (*k, *v)).collect()
}

pub fn with_uptime(seconds: u64) -> AppResult<StatusInfo> {
    Ok(snapshot(&[("uptime_in_seconds", &seconds.to_string())]))
}

pub fn fetch_failure() -> AppResult<StatusInfo> {
    Err(AppError::StatusFetch {
        endpoint: "localhost:6379".to_string(),
        reason: "connection refused".to_string(),
    })
}

/// Wall-clock instant `seconds` after the epoch
pub fn at(seconds: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(seconds)
}
