//! Error types for the worker-dispatch crate.
//!
//! Probe failures and acquisition shortfalls are not errors: they are
//! reported through return values. Only claim transport failures and
//! provisioning failures abort a dispatch batch.

use thiserror::Error;

/// Error returned when a proxy slice has nothing to route through.
#[derive(Debug, Error)]
#[error("No proxy available in pool")]
pub struct NoProxyAvailable;

/// Failure while pulling a batch of candidates from the proxy vendor.
#[derive(Debug, Error)]
pub enum VendorError {
    #[error("vendor request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("vendor answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid vendor url: {0}")]
    Url(#[from] url::ParseError),
}

/// A claim request that never produced an HTTP response.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("claim request to {address} failed: {source}")]
    Transport {
        address: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClaimError {
    /// Address of the worker the claim was aimed at.
    pub fn address(&self) -> &str {
        match self {
            ClaimError::Transport { address, .. } => address,
        }
    }
}

/// Failure to launch a new worker process.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to spawn worker for {job}: {source}")]
    Spawn {
        job: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode job {job}: {source}")]
    Encode {
        job: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings store failures.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("setting `{0}` is not configured")]
    Missing(&'static str),
    #[error("setting `{key}` has an unexpected type")]
    InvalidType { key: String },
    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a dispatch batch. Jobs assigned before the failure stay
/// assigned.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}
