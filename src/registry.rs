//! Table of live workers fed by heartbeats.

use crate::config::RegistryConfig;

use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A running purchase-attempt worker as last reported by itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Base URL used to reach the worker. Unique in the registry.
    pub address: String,
    /// What the worker says it is doing.
    pub status_detail: String,
    /// When the last heartbeat arrived.
    pub last_heartbeat: DateTime<Utc>,
}

struct Entry {
    worker: Worker,
    // Order of first registration, used to keep snapshots stable.
    seq: u64,
}

#[derive(Default)]
struct Table {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// Registry of workers keyed by address.
///
/// Created once per coordinator process and shared by handle with the
/// dispatcher and the heartbeat endpoint. Reports are whole-record upserts
/// under a write lock, so concurrent reports for one address never merge:
/// the last applied write wins.
pub struct WorkerRegistry {
    table: RwLock<Table>,
    config: RegistryConfig,
}

impl WorkerRegistry {
    /// Empty registry using `config` for staleness.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            config,
        }
    }

    /// Record a heartbeat from `address`.
    pub fn report(&self, address: &str, status_detail: &str) {
        self.report_at(address, status_detail, Utc::now());
    }

    pub(crate) fn report_at(&self, address: &str, status_detail: &str, at: DateTime<Utc>) {
        let worker = Worker {
            address: address.to_string(),
            status_detail: status_detail.to_string(),
            last_heartbeat: at,
        };

        let mut table = self.table.write();
        let table = &mut *table;
        match table.entries.get_mut(address) {
            Some(entry) => entry.worker = worker,
            None => {
                info!("Worker {} registered: {}", address, status_detail);
                let seq = table.next_seq;
                table.next_seq += 1;
                table.entries.insert(address.to_string(), Entry { worker, seq });
            }
        }
        debug!("Heartbeat from {}: {}", address, status_detail);
    }

    /// Snapshot of workers considered alive, in registration order.
    pub fn available(&self) -> Vec<Worker> {
        let now = Utc::now();
        self.snapshot(|w| !self.is_stale(w, now))
    }

    /// Snapshot of every known worker, stale or not, in registration order.
    pub fn all(&self) -> Vec<Worker> {
        self.snapshot(|_| true)
    }

    /// Drop workers whose heartbeat is older than the staleness threshold.
    /// Returns the number removed.
    pub fn prune(&self) -> usize {
        let now = Utc::now();
        let mut table = self.table.write();
        let before = table.entries.len();
        table.entries.retain(|_, e| !self.is_stale(&e.worker, now));
        let removed = before - table.entries.len();
        if removed > 0 {
            info!("Pruned {} stale workers", removed);
        }
        removed
    }

    /// Number of known workers, stale ones included.
    pub fn len(&self) -> usize {
        self.table.read().entries.len()
    }

    /// Whether no worker has reported yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self, keep: impl Fn(&Worker) -> bool) -> Vec<Worker> {
        let table = self.table.read();
        let mut entries: Vec<&Entry> = table.entries.values().filter(|e| keep(&e.worker)).collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.worker.clone()).collect()
    }

    fn is_stale(&self, worker: &Worker, now: DateTime<Utc>) -> bool {
        match self.config.stale_after {
            Some(limit) => match chrono::Duration::from_std(limit) {
                Ok(limit) => now - worker.last_heartbeat > limit,
                Err(_) => false,
            },
            None => false,
        }
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn report_upserts_in_place() {
        let registry = WorkerRegistry::default();
        registry.report("http://w1", "idle");
        registry.report("http://w2", "idle");
        registry.report("http://w1", "buying");

        let workers = registry.available();
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].address, "http://w1");
        assert_eq!(workers[0].status_detail, "buying");
        assert_eq!(workers[1].address, "http://w2");
    }

    #[test]
    fn stale_workers_are_hidden_and_pruned() {
        let registry = WorkerRegistry::new(RegistryConfig {
            stale_after: Some(Duration::from_secs(30)),
        });
        registry.report_at("http://old", "idle", Utc::now() - chrono::Duration::seconds(120));
        registry.report("http://fresh", "idle");

        let available: Vec<String> = registry.available().into_iter().map(|w| w.address).collect();
        assert_eq!(available, vec!["http://fresh"]);
        assert_eq!(registry.all().len(), 2);

        assert_eq!(registry.prune(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn without_threshold_nothing_expires() {
        let registry = WorkerRegistry::new(RegistryConfig { stale_after: None });
        registry.report_at("http://old", "idle", Utc::now() - chrono::Duration::days(3));
        assert_eq!(registry.available().len(), 1);
        assert_eq!(registry.prune(), 0);
    }

    #[test]
    fn concurrent_reports_for_one_address_keep_a_whole_record() {
        let registry = Arc::new(WorkerRegistry::default());
        let handles: Vec<_> = ["first", "second"]
            .into_iter()
            .map(|detail| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        registry.report("http://w", detail);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let workers = registry.available();
        assert_eq!(workers.len(), 1);
        assert!(["first", "second"].contains(&workers[0].status_detail.as_str()));
    }
}
