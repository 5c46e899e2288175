//! Jobs submitted by the operator and the payloads sent to workers.

use crate::error::SettingsError;
use crate::settings::{keys, SettingsStore};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// One purchase-attempt configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Display name, usually the configuration file name.
    pub name: String,
    /// Raw configuration describing the purchase target.
    pub train_info: String,
}

impl Job {
    pub fn new(name: impl Into<String>, train_info: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            train_info: train_info.into(),
        }
    }

    /// Load a job from a configuration file, named after the file.
    pub async fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let train_info = tokio::fs::read_to_string(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, train_info })
    }
}

/// Timing and retry policy shared by every job of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Start of the purchase window, as typed by the operator.
    pub time_start: String,
    /// Milliseconds between attempts.
    pub interval: u64,
    /// 0 runs until success, 1 stops after `total_attempts`.
    pub mode: u32,
    pub total_attempts: u64,
    pub audio_path: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            time_start: String::new(),
            interval: 1000,
            mode: 0,
            total_attempts: 100,
            audio_path: None,
        }
    }
}

/// Notification channel tokens forwarded to workers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notifications {
    #[serde(rename = "pushplusToken")]
    pub pushplus_token: Option<String>,
    #[serde(rename = "serverchanKey")]
    pub serverchan_key: Option<String>,
    pub ntfy_url: Option<String>,
    pub ntfy_username: Option<String>,
    pub ntfy_password: Option<String>,
}

impl Notifications {
    pub fn from_settings(settings: &dyn SettingsStore) -> Result<Self, SettingsError> {
        Ok(Self {
            pushplus_token: settings.get_string(keys::PUSHPLUS_TOKEN)?,
            serverchan_key: settings.get_string(keys::SERVERCHAN_KEY)?,
            ntfy_url: settings.get_string(keys::NTFY_URL)?,
            ntfy_username: settings.get_string(keys::NTFY_USERNAME)?,
            ntfy_password: settings.get_string(keys::NTFY_PASSWORD)?,
        })
    }
}

/// Body of `POST /buy`, and the job description handed to new workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimPayload {
    pub force: bool,
    pub train_info: String,
    #[serde(flatten)]
    pub options: RunOptions,
    #[serde(flatten)]
    pub notifications: Notifications,
    /// Comma-separated proxy slice. Empty keeps the worker's current proxies.
    pub https_proxys: String,
}

impl ClaimPayload {
    pub fn new(job: &Job, options: &RunOptions, notifications: &Notifications) -> Self {
        Self {
            force: true,
            train_info: job.train_info.clone(),
            options: options.clone(),
            notifications: notifications.clone(),
            https_proxys: String::new(),
        }
    }

    pub fn with_proxies(mut self, https_proxys: impl Into<String>) -> Self {
        self.https_proxys = https_proxys.into();
        self
    }
}
