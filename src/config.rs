//! Configuration management for rediscope
//!
//! Parses TOML configuration files and provides typed access to settings.

use crate::builder::Metric;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP exposition server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9121
}

/// How to reach the Redis server
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Unix,
}

/// Redis connection settings
#[derive(Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// `host:port` for tcp, socket path for unix
    pub endpoint: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Plaintext when absent
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("endpoint", &self.endpoint)
            .field("transport", &self.transport)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("tls", &self.tls)
            .finish()
    }
}

fn default_connect_timeout() -> u64 {
    5
}

/// TLS settings for the Redis connection
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    /// PEM bundle of trusted CAs; the platform roots are used when absent
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    /// Name to verify the server certificate against; defaults to the endpoint host
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Scrape scheduling
///
/// Fields are private and validated on deserialization, so an instance with
/// a zero interval or a timeout longer than the interval cannot exist.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeConfig {
    collection_interval_seconds: u64,
    timeout_seconds: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            collection_interval_seconds: 10,
            timeout_seconds: 5,
        }
    }
}

impl ScrapeConfig {
    /// Create a validated scrape schedule
    ///
    /// # Errors
    ///
    /// Returns an error if the interval is outside (0, 3600], the timeout is
    /// outside (0, 300], or the timeout exceeds the interval.
    pub fn new(collection_interval_seconds: u64, timeout_seconds: u64) -> AppResult<Self> {
        if collection_interval_seconds == 0 || collection_interval_seconds > 3600 {
            return Err(AppError::Config(format!(
                "scrape.collection_interval_seconds must be between 1 and 3600, got {}",
                collection_interval_seconds
            )));
        }
        if timeout_seconds == 0 || timeout_seconds > 300 {
            return Err(AppError::Config(format!(
                "scrape.timeout_seconds must be between 1 and 300, got {}",
                timeout_seconds
            )));
        }
        if timeout_seconds > collection_interval_seconds {
            return Err(AppError::Config(format!(
                "scrape.timeout_seconds ({}) cannot exceed scrape.collection_interval_seconds ({}); \
                cycles would overlap",
                timeout_seconds, collection_interval_seconds
            )));
        }
        Ok(Self {
            collection_interval_seconds,
            timeout_seconds,
        })
    }

    pub fn collection_interval_seconds(&self) -> u64 {
        self.collection_interval_seconds
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

impl<'de> Deserialize<'de> for ScrapeConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Raw shape before validation
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct RawScrapeConfig {
            #[serde(default)]
            collection_interval_seconds: Option<u64>,
            #[serde(default)]
            timeout_seconds: Option<u64>,
        }

        let raw = RawScrapeConfig::deserialize(deserializer)?;
        let defaults = ScrapeConfig::default();
        ScrapeConfig::new(
            raw.collection_interval_seconds
                .unwrap_or(defaults.collection_interval_seconds),
            raw.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        )
        .map_err(|e| serde::de::Error::custom(format!("Invalid scrape configuration: {}", e)))
    }
}

/// Per-metric switches
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Dotted metric names (e.g. "redis.latest_fork") that are never recorded
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl MetricsConfig {
    /// Resolve `disabled` against the metric catalogue
    pub fn disabled_metrics(&self) -> AppResult<HashSet<Metric>> {
        self.disabled
            .iter()
            .map(|name| {
                Metric::from_name(name).ok_or_else(|| {
                    AppError::Config(format!(
                        "metrics.disabled contains unknown metric '{}'",
                        name
                    ))
                })
            })
            .collect()
    }
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        let config: Self = toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
            path: path_display.clone(),
            source,
        })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called by `from_file()` and `from_str()`; call it explicitly when
    /// building a `Config` by hand.
    pub fn validate(&self) -> AppResult<()> {
        let redis = &self.redis;

        if redis.endpoint.trim().is_empty() {
            return Err(AppError::Config(
                "redis.endpoint must not be empty".to_string(),
            ));
        }

        match redis.transport {
            Transport::Tcp => {
                let port = redis
                    .endpoint
                    .rsplit_once(':')
                    .map(|(_, port)| port.parse::<u16>());
                if !matches!(port, Some(Ok(_))) {
                    return Err(AppError::Config(format!(
                        "redis.endpoint '{}' must be in host:port form for tcp transport",
                        redis.endpoint
                    )));
                }
            }
            Transport::Unix => {
                if redis.tls.is_some() {
                    return Err(AppError::Config(
                        "redis.tls cannot be combined with unix transport".to_string(),
                    ));
                }
                if !cfg!(unix) {
                    return Err(AppError::Config(
                        "unix transport is not supported on this platform".to_string(),
                    ));
                }
            }
        }

        if redis.connect_timeout_seconds == 0 || redis.connect_timeout_seconds > 300 {
            return Err(AppError::Config(format!(
                "redis.connect_timeout_seconds must be between 1 and 300, got {}",
                redis.connect_timeout_seconds
            )));
        }

        if redis.password.as_deref() == Some("") {
            return Err(AppError::Config(
                "redis.password is empty; remove it to connect without AUTH".to_string(),
            ));
        }

        self.metrics.disabled_metrics()?;

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
