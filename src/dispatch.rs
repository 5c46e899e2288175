//! Assigning a batch of jobs to existing or freshly provisioned workers.

use crate::claim::{ClaimOutcome, WorkerClient};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::job::{ClaimPayload, Job, Notifications, RunOptions};
use crate::pool::ProxyProvider;
use crate::provision::{Provisioner, SpawnRequest};
use crate::proxy::{candidate_list, split_round_robin, NONE_SENTINEL};
use crate::registry::{Worker, WorkerRegistry};
use crate::utils::with_time_string;

use log::info;
use std::sync::Arc;

pub const NO_JOBS_MESSAGE: &str = "no job configuration submitted";
pub const STARTED_MESSAGE: &str = "dispatching jobs, see the terminal for details";
pub const FINISHED_MESSAGE: &str = "workers are starting, wait for their pages to open";

/// How a job was placed.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// An existing worker accepted the claim.
    AssignedExisting { job: String, worker: String },
    /// A new worker was launched with this proxy slice.
    AssignedNew { job: String, proxies: Vec<String> },
}

/// Result of one dispatch batch, one outcome per job in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub outcomes: Vec<JobOutcome>,
}

impl DispatchReport {
    pub fn claimed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, JobOutcome::AssignedExisting { .. }))
            .count()
    }

    pub fn provisioned(&self) -> usize {
        self.outcomes.len() - self.claimed()
    }
}

/// Places jobs on workers.
///
/// A batch walks one snapshot of the registry with a cursor that only moves
/// forward: a worker that refused one job is not offered later jobs of the
/// same batch. Jobs left over are spread over new workers, each with its own
/// round-robin slice of the proxy list. Concurrent batches each take their
/// own snapshot, so two of them may offer the same worker a job; the worker
/// answers 409 to the loser.
pub struct Dispatcher {
    registry: Arc<WorkerRegistry>,
    client: Arc<dyn WorkerClient>,
    provisioner: Arc<dyn Provisioner>,
    provider: Option<Arc<ProxyProvider>>,
    /// Dispatcher configuration.
    pub config: DispatchConfig,
}

impl Dispatcher {
    /// Dispatcher without a proxy provider; proxies are used as given.
    pub fn new(
        registry: Arc<WorkerRegistry>,
        client: Arc<dyn WorkerClient>,
        provisioner: Arc<dyn Provisioner>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            client,
            provisioner,
            provider: None,
            config,
        }
    }

    /// Use `provider` to rank proxies when `rank_proxies` is enabled.
    pub fn with_provider(mut self, provider: Arc<ProxyProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Assign every job in `jobs`.
    ///
    /// `status` receives a timestamped line when the batch starts and when
    /// it ends. Claim transport errors and provisioning errors stop the batch;
    /// jobs already placed stay placed.
    pub async fn dispatch(
        &self,
        jobs: &[Job],
        options: &RunOptions,
        notifications: &Notifications,
        raw_proxies: &str,
        mut status: impl FnMut(String),
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();
        if jobs.is_empty() {
            status(with_time_string(NO_JOBS_MESSAGE));
            return Ok(report);
        }
        status(with_time_string(STARTED_MESSAGE));

        let proxies = self.candidates(raw_proxies).await;
        let workers = self.registry.available();
        let mut cursor = workers.iter();
        let mut slices: Option<std::vec::IntoIter<Vec<String>>> = None;

        for (idx, job) in jobs.iter().enumerate() {
            info!("Dispatching {}", job.name);
            let payload = ClaimPayload::new(job, options, notifications);

            if let Some(worker) = self.claim_next(&mut cursor, &payload).await? {
                info!("{} assigned to existing worker {}", job.name, worker.address);
                report.outcomes.push(JobOutcome::AssignedExisting {
                    job: job.name.clone(),
                    worker: worker.address.clone(),
                });
                continue;
            }

            // Partition once, over the jobs still unplaced at the first fallback.
            let remaining =
                slices.get_or_insert_with(|| split_round_robin(&proxies, jobs.len() - idx).into_iter());
            let slice = remaining.next().unwrap_or_default();

            self.provisioner
                .spawn(SpawnRequest {
                    name: job.name.clone(),
                    callback_url: self.config.callback_url.clone(),
                    payload: payload.with_proxies(slice.join(",")),
                })
                .await?;
            report.outcomes.push(JobOutcome::AssignedNew {
                job: job.name.clone(),
                proxies: slice,
            });
        }

        info!(
            "Dispatch finished: {} claimed, {} provisioned",
            report.claimed(),
            report.provisioned()
        );
        status(with_time_string(FINISHED_MESSAGE));
        Ok(report)
    }

    /// Offer `payload` to workers from `cursor` until one accepts.
    async fn claim_next<'a>(
        &self,
        cursor: &mut std::slice::Iter<'a, Worker>,
        payload: &ClaimPayload,
    ) -> Result<Option<&'a Worker>, DispatchError> {
        for worker in cursor.by_ref() {
            match self.client.claim(&worker.address, payload).await? {
                ClaimOutcome::Claimed => return Ok(Some(worker)),
                ClaimOutcome::Occupied | ClaimOutcome::Refused(_) => continue,
            }
        }
        Ok(None)
    }

    async fn candidates(&self, raw_proxies: &str) -> Vec<String> {
        let candidates = candidate_list(raw_proxies);
        match (&self.provider, self.config.rank_proxies) {
            (Some(provider), true) => {
                let mut ranked = vec![NONE_SENTINEL.to_string()];
                ranked.extend(provider.rank(&candidates).await);
                ranked
            }
            _ => candidates,
        }
    }
}
