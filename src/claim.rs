//! Claim protocol: asking an existing worker to take a job.

use crate::error::ClaimError;
use crate::job::ClaimPayload;

use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::StatusCode;
use std::time::Duration;

/// Answer of a worker to a claim request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// 200: the worker took the job.
    Claimed,
    /// 409: the worker is busy with another job.
    Occupied,
    /// Any other status.
    Refused(StatusCode),
}

/// Sends claim requests to workers.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Offer `payload` to the worker at `address`. Transport failures are
    /// errors; every HTTP answer is an outcome.
    async fn claim(&self, address: &str, payload: &ClaimPayload) -> Result<ClaimOutcome, ClaimError>;
}

/// Claims over HTTP with a fixed per-request timeout and no retries.
#[derive(Debug, Clone)]
pub struct HttpWorkerClient {
    client: reqwest::Client,
}

impl HttpWorkerClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn claim(&self, address: &str, payload: &ClaimPayload) -> Result<ClaimOutcome, ClaimError> {
        let url = format!("{}/buy", address.trim_end_matches('/'));

        let response = match self.client.post(&url).json(payload).send().await {
            Ok(response) => response,
            Err(source) => {
                error!("Claim request to {} failed: {}", address, source);
                return Err(ClaimError::Transport {
                    address: address.to_string(),
                    source,
                });
            }
        };

        let outcome = match response.status() {
            StatusCode::OK => ClaimOutcome::Claimed,
            StatusCode::CONFLICT => ClaimOutcome::Occupied,
            status => ClaimOutcome::Refused(status),
        };
        match outcome {
            ClaimOutcome::Claimed => info!("{} accepted the job", address),
            ClaimOutcome::Occupied => info!("{} is already occupied", address),
            ClaimOutcome::Refused(status) => warn!("{} refused the job with {}", address, status),
        }
        Ok(outcome)
    }
}
