//! Proxy acquisition, health checking and ranking.

use crate::config::{AcquireConfig, RankConfig};
use crate::error::SettingsError;
use crate::probe::ProxyProbe;
use crate::proxy::{is_none_sentinel, ProbeResult};
use crate::settings::{keys, SettingsStore};
use crate::vendor::VendorSource;

use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::time;

/// Supplies usable egress proxies.
pub struct ProxyProvider {
    probe: Arc<dyn ProxyProbe>,
    /// Configuration for vendor acquisition.
    pub acquire_config: AcquireConfig,
    /// Configuration for ranking known proxies.
    pub rank_config: RankConfig,
}

impl ProxyProvider {
    /// Provider using `probe` with default acquisition and ranking settings.
    pub fn new(probe: Arc<dyn ProxyProbe>) -> Self {
        Self {
            probe,
            acquire_config: AcquireConfig::default(),
            rank_config: RankConfig::default(),
        }
    }

    /// Replace the acquisition settings.
    pub fn with_acquire_config(mut self, config: AcquireConfig) -> Self {
        self.acquire_config = config;
        self
    }

    /// Replace the ranking settings.
    pub fn with_rank_config(mut self, config: RankConfig) -> Self {
        self.rank_config = config;
        self
    }

    /// Pull batches from `vendor` until `count` proxies answer the probe or
    /// the attempt budget runs out.
    ///
    /// Each batch is probed with at most `max_workers` probes in flight and
    /// read in completion order, so checking stops as soon as enough proxies
    /// have succeeded. A short result is a valid outcome.
    pub async fn acquire(&self, vendor: &dyn VendorSource) -> Vec<String> {
        self.acquire_with(vendor, &self.acquire_config).await
    }

    async fn acquire_with(&self, vendor: &dyn VendorSource, config: &AcquireConfig) -> Vec<String> {
        let mut usable: Vec<String> = Vec::new();
        let mut attempts = 0;

        while usable.len() < config.count && attempts < config.max_attempts {
            info!("Fetching proxy batch, attempt {}", attempts + 1);

            match vendor.fetch_batch(config.batch_size).await {
                Ok(candidates) => {
                    info!(
                        "Testing {} proxies, timeout {:.1}s",
                        candidates.len(),
                        config.probe_timeout.as_secs_f64()
                    );
                    let timeout = config.probe_timeout;
                    let mut checks = stream::iter(candidates)
                        .map(|proxy| {
                            let probe = Arc::clone(&self.probe);
                            async move { probe.check(&proxy, timeout).await }
                        })
                        .buffer_unordered(config.max_workers);

                    while let Some(result) = checks.next().await {
                        if result.is_reachable() {
                            usable.push(result.proxy);
                            info!("Usable proxy {}/{}", usable.len(), config.count);
                            if usable.len() >= config.count {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to fetch proxies from vendor: {}", e);
                }
            }

            attempts += 1;
            if usable.len() < config.count && attempts < config.max_attempts {
                time::sleep(config.backoff).await;
            }
        }

        if usable.len() < config.count {
            warn!(
                "Only acquired {} usable proxies, wanted {}",
                usable.len(),
                config.count
            );
        } else {
            info!("Acquired {} usable proxies", usable.len());
        }

        usable
    }

    /// Probe `candidates` one after another and return the reachable ones no
    /// slower than `max_rtt`, fastest first.
    ///
    /// The `"none"` sentinel is skipped. Equal latencies keep input order.
    pub async fn rank(&self, candidates: &[String]) -> Vec<String> {
        let mut results: Vec<ProbeResult> = Vec::new();

        for proxy in candidates {
            if is_none_sentinel(proxy) {
                continue;
            }
            let result = self.probe.check(proxy, self.rank_config.probe_timeout).await;
            match result.rtt {
                Some(rtt) if rtt <= self.rank_config.max_rtt => {
                    info!("{} responded in {:.2}s", proxy, rtt.as_secs_f64());
                    results.push(result);
                }
                _ => warn!("{} is unreachable or too slow", proxy),
            }
        }

        results.sort_by_key(|r| r.rtt);
        results.into_iter().map(|r| r.proxy).collect()
    }

    /// Probe every candidate sequentially and report one row per proxy.
    pub async fn survey(&self, candidates: &[String]) -> Vec<ProbeResult> {
        let mut rows = Vec::with_capacity(candidates.len());
        for proxy in candidates {
            rows.push(self.probe.check(proxy, self.rank_config.probe_timeout).await);
        }
        rows
    }

    /// Acquire fresh proxies, re-check them and persist the reachable ones
    /// as the configured proxy string.
    ///
    /// The wanted count and probe timeout come from the stored vendor
    /// settings; invalid values fail before the vendor is called.
    pub async fn refresh_into(
        &self,
        vendor: &dyn VendorSource,
        settings: &dyn SettingsStore,
    ) -> Result<Vec<ProbeResult>, SettingsError> {
        let config = self.acquire_config.clone().with_settings(settings)?;
        let acquired = self.acquire_with(vendor, &config).await;
        info!("Acquired proxy list: {:?}", acquired);

        let rows = self.survey(&acquired).await;
        let valid: Vec<&str> = rows
            .iter()
            .filter(|r| r.is_reachable())
            .map(|r| r.proxy.as_str())
            .collect();

        settings.set(keys::HTTPS_PROXY, valid.join(",").into())?;
        Ok(rows)
    }
}
