//! Configuration for proxy acquisition, ranking, dispatch and the registry.

use crate::error::SettingsError;
use crate::settings::{keys, SettingsStore};

use serde_json::Value;
use std::time::Duration;

/// Default URL used to decide whether a proxy can reach the target service.
pub const DEFAULT_PROBE_URL: &str = "https://www.bilibili.com";

/// Configuration for acquiring fresh proxies from the vendor.
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    /// Number of usable proxies wanted.
    pub count: usize,
    /// Candidates requested from the vendor per attempt.
    pub batch_size: usize,
    /// Maximum number of vendor batches to try.
    pub max_attempts: usize,
    /// Maximum number of probes running at once.
    pub max_workers: usize,
    /// Total budget for a single probe.
    pub probe_timeout: Duration,
    /// Pause between vendor batches.
    pub backoff: Duration,
}

impl AcquireConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AcquireConfigBuilder {
        AcquireConfigBuilder::new()
    }
}

impl AcquireConfig {
    /// Override `count` and `probe_timeout` from the stored vendor settings.
    ///
    /// Missing values fall back to 5 proxies and 5 seconds. Anything that is
    /// not a positive number is rejected before the vendor is called.
    pub fn with_settings(mut self, settings: &dyn SettingsStore) -> Result<Self, SettingsError> {
        self.count = match settings.get(keys::VENDOR_NUM)? {
            None | Some(Value::Null) => 5,
            Some(value) => match value.as_u64() {
                Some(n) if n > 0 => n as usize,
                _ => return Err(invalid(keys::VENDOR_NUM)),
            },
        };
        self.probe_timeout = match settings.get(keys::VENDOR_MAX_TIMEOUT)? {
            None | Some(Value::Null) => Duration::from_secs(5),
            Some(value) => match value.as_f64() {
                Some(secs) if secs > 0.0 && secs.is_finite() => Duration::from_secs_f64(secs),
                _ => return Err(invalid(keys::VENDOR_MAX_TIMEOUT)),
            },
        };
        Ok(self)
    }
}

fn invalid(key: &str) -> SettingsError {
    SettingsError::InvalidType {
        key: key.to_string(),
    }
}

impl Default for AcquireConfig {
    fn default() -> Self {
        AcquireConfigBuilder::new().build()
    }
}

/// Builder for `AcquireConfig`.
#[derive(Default)]
pub struct AcquireConfigBuilder {
    count: Option<usize>,
    batch_size: Option<usize>,
    max_attempts: Option<usize>,
    max_workers: Option<usize>,
    probe_timeout: Option<Duration>,
    backoff: Option<Duration>,
}

impl AcquireConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of usable proxies wanted.
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Set the number of candidates requested per vendor call.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Set the maximum number of vendor batches.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the number of probes allowed to run concurrently.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// Set the timeout of a single probe.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// Set the pause between vendor batches.
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> AcquireConfig {
        AcquireConfig {
            count: self.count.unwrap_or(5),
            batch_size: self.batch_size.unwrap_or(10),
            max_attempts: self.max_attempts.unwrap_or(1000),
            max_workers: self.max_workers.unwrap_or(10).max(1),
            probe_timeout: self.probe_timeout.unwrap_or(Duration::from_secs(3)),
            backoff: self.backoff.unwrap_or(Duration::from_secs(1)),
        }
    }
}

/// Configuration for ranking an already-known proxy list.
#[derive(Debug, Clone)]
pub struct RankConfig {
    /// Proxies slower than this are discarded.
    pub max_rtt: Duration,
    /// Total budget for a single probe.
    pub probe_timeout: Duration,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            max_rtt: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(3),
        }
    }
}

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Address new workers report their heartbeats to.
    pub callback_url: String,
    /// Timeout of a single claim request.
    pub claim_timeout: Duration,
    /// Re-rank the configured proxies before partitioning them.
    pub rank_proxies: bool,
}

impl DispatchConfig {
    /// Create a new configuration builder.
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::new()
    }
}

/// Builder for `DispatchConfig`.
#[derive(Default)]
pub struct DispatchConfigBuilder {
    callback_url: Option<String>,
    claim_timeout: Option<Duration>,
    rank_proxies: bool,
}

impl DispatchConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heartbeat callback address handed to new workers.
    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    /// Set the claim request timeout.
    pub fn claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = Some(timeout);
        self
    }

    /// Rank the configured proxies by latency before handing them out.
    pub fn rank_proxies(mut self, rank: bool) -> Self {
        self.rank_proxies = rank;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> DispatchConfig {
        DispatchConfig {
            callback_url: self
                .callback_url
                .unwrap_or_else(|| "http://127.0.0.1:7860".to_string()),
            claim_timeout: self.claim_timeout.unwrap_or(Duration::from_secs(5)),
            rank_proxies: self.rank_proxies,
        }
    }
}

/// Configuration for the worker registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Workers silent for longer than this are hidden from `available()`.
    /// `None` keeps every worker visible forever.
    pub stale_after: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            stale_after: Some(Duration::from_secs(60)),
        }
    }
}

/// Configuration for the proxy slice middleware used inside workers.
#[derive(Debug, Clone)]
pub struct MiddlewareConfig {
    /// Number of times to retry a request with the next proxy of the slice.
    pub retry_count: usize,
    /// Timeout applied to each proxied request.
    pub request_timeout: Duration,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;
    use serde_json::json;

    #[test]
    fn acquire_defaults() {
        let config = AcquireConfig::default();
        assert_eq!(config.count, 5);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_attempts, 1000);
        assert_eq!(config.max_workers, 10);
        assert_eq!(config.probe_timeout, Duration::from_secs(3));
        assert_eq!(config.backoff, Duration::from_secs(1));
    }

    #[test]
    fn vendor_settings_default_to_five() {
        let settings = MemorySettings::new();
        let config = AcquireConfig::builder()
            .count(9)
            .batch_size(20)
            .build()
            .with_settings(&settings)
            .unwrap();
        assert_eq!(config.count, 5);
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.batch_size, 20);
    }

    #[test]
    fn vendor_settings_override_count_and_timeout() {
        let settings = MemorySettings::new();
        settings.set(keys::VENDOR_NUM, json!(8)).unwrap();
        settings.set(keys::VENDOR_MAX_TIMEOUT, json!(1.5)).unwrap();
        let config = AcquireConfig::default().with_settings(&settings).unwrap();
        assert_eq!(config.count, 8);
        assert_eq!(config.probe_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn non_positive_vendor_settings_are_rejected() {
        for (key, value) in [
            (keys::VENDOR_NUM, json!(0)),
            (keys::VENDOR_NUM, json!(-3)),
            (keys::VENDOR_NUM, json!("5")),
            (keys::VENDOR_MAX_TIMEOUT, json!(0)),
            (keys::VENDOR_MAX_TIMEOUT, json!("fast")),
        ] {
            let settings = MemorySettings::new();
            settings.set(key, value).unwrap();
            match AcquireConfig::default().with_settings(&settings) {
                Err(SettingsError::InvalidType { key: bad }) => assert_eq!(bad, key),
                other => panic!("{} accepted: {:?}", key, other.map(|c| c.count)),
            }
        }
    }

    #[test]
    fn zero_workers_is_clamped() {
        let config = AcquireConfig::builder().max_workers(0).build();
        assert_eq!(config.max_workers, 1);
    }

    #[test]
    fn dispatch_builder_overrides() {
        let config = DispatchConfig::builder()
            .callback_url("http://10.0.0.1:9000")
            .claim_timeout(Duration::from_secs(2))
            .rank_proxies(true)
            .build();
        assert_eq!(config.callback_url, "http://10.0.0.1:9000");
        assert_eq!(config.claim_timeout, Duration::from_secs(2));
        assert!(config.rank_proxies);
    }
}
