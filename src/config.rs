//! Configuration for the delivery daemon.

use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use wahook_delivery::{
    client::DEFAULT_SINK_URL, RetryPolicy, SinkConfig, WorkerConfig, DEFAULT_MAX_RETRIES,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRY_DELAY_MS, DEFAULT_TIMEOUT_SECONDS,
};

const CONFIG_FILE: &str = "config.toml";

/// Daemon configuration with defaults, file, and environment overrides.
///
/// Loaded in priority order: environment variables, then `config.toml`,
/// then built-in defaults. The daemon works out of the box against a local
/// Redis and the documented default sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Destination sink URL for webhook delivery.
    ///
    /// Environment variable: `WEBHOOK_URL`. Empty means "not configured";
    /// the documented default is used with a warning.
    #[serde(default, alias = "WEBHOOK_URL", alias = "webhook_url")]
    pub sink_url: String,

    /// Redis connection URL for the durable queue store.
    ///
    /// Environment variable: `REDIS_URL`
    #[serde(default = "default_redis_url", alias = "REDIS_URL")]
    pub redis_url: String,

    /// Failed delivery attempts before an envelope is dead-lettered.
    ///
    /// Environment variable: `MAX_RETRIES`
    #[serde(default = "default_max_retries", alias = "MAX_RETRIES")]
    pub max_retries: u32,

    /// Delay before a failed envelope is re-queued, in milliseconds.
    ///
    /// Environment variable: `RETRY_DELAY_MS`
    #[serde(default = "default_retry_delay_ms", alias = "RETRY_DELAY_MS")]
    pub retry_delay_ms: u64,

    /// HTTP delivery timeout in seconds.
    ///
    /// Environment variable: `DELIVERY_TIMEOUT_SECONDS`
    #[serde(default = "default_delivery_timeout", alias = "DELIVERY_TIMEOUT_SECONDS")]
    pub delivery_timeout_seconds: u64,

    /// Worker poll interval in milliseconds.
    ///
    /// Environment variable: `POLL_INTERVAL_MS`
    #[serde(default = "default_poll_interval_ms", alias = "POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Value of the `X-Webhook-Source` header on delivered payloads.
    ///
    /// Environment variable: `WEBHOOK_SOURCE`
    #[serde(default = "default_source_header", alias = "WEBHOOK_SOURCE", alias = "webhook_source")]
    pub source_header: String,

    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Loads configuration from defaults, `config.toml`, and environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Sink URL with documented fallback, warning when unset.
    pub fn resolved_sink_url(&self) -> String {
        if self.sink_url.is_empty() {
            warn!(default = DEFAULT_SINK_URL, "WEBHOOK_URL not set, using default sink URL");
            DEFAULT_SINK_URL.to_string()
        } else {
            self.sink_url.clone()
        }
    }

    /// Converts to the delivery crate's worker configuration.
    pub fn to_worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            retry_policy: RetryPolicy {
                max_retries: self.max_retries,
                delay: Duration::from_millis(self.retry_delay_ms),
            },
        }
    }

    /// Converts to the sink client configuration.
    pub fn to_sink_config(&self) -> SinkConfig {
        SinkConfig {
            url: self.resolved_sink_url(),
            timeout: Duration::from_secs(self.delivery_timeout_seconds),
            source_header: self.source_header.clone(),
        }
    }

    /// Validates configuration values.
    fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            anyhow::bail!("max_retries must be greater than 0");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }
        if self.delivery_timeout_seconds == 0 {
            anyhow::bail!("delivery_timeout_seconds must be greater than 0");
        }
        if self.source_header.is_empty() {
            anyhow::bail!("source_header must not be empty");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sink_url: String::new(),
            redis_url: default_redis_url(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            delivery_timeout_seconds: default_delivery_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            source_header: default_source_header(),
            rust_log: default_log_level(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_delivery_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_source_header() -> String {
    "wa-gateway".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_baseline() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 5_000);
        assert_eq!(config.delivery_timeout_seconds, 10);
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.source_header, "wa-gateway");
    }

    #[test]
    fn unset_sink_url_falls_back_to_default() {
        let config = Config::default();
        assert_eq!(config.resolved_sink_url(), DEFAULT_SINK_URL);

        let config = Config { sink_url: "https://crm.example.com/hook".to_string(), ..config };
        assert_eq!(config.resolved_sink_url(), "https://crm.example.com/hook");
    }

    #[test]
    fn worker_config_conversion() {
        let config = Config {
            max_retries: 5,
            retry_delay_ms: 2_500,
            poll_interval_ms: 50,
            ..Config::default()
        };

        let worker_config = config.to_worker_config();
        assert_eq!(worker_config.poll_interval, Duration::from_millis(50));
        assert_eq!(worker_config.retry_policy.max_retries, 5);
        assert_eq!(worker_config.retry_policy.delay, Duration::from_millis(2_500));
    }

    #[test]
    fn invalid_values_rejected() {
        let config = Config { max_retries: 0, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { poll_interval_ms: 0, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { delivery_timeout_seconds: 0, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { source_header: String::new(), ..Config::default() };
        assert!(config.validate().is_err());
    }
}
