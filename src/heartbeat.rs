//! Worker-side heartbeat reporter.

use crate::server::ReportRequest;

use log::{debug, warn};
use std::time::Duration;

/// Posts heartbeats to the coordinator's `/report` endpoint.
pub struct HeartbeatReporter {
    callback_url: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HeartbeatReporter {
    /// `callback_url` is the coordinator, `endpoint` the address this worker
    /// is claimed at.
    pub fn new(
        callback_url: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            callback_url: callback_url.into(),
            endpoint: endpoint.into(),
            client,
        })
    }

    fn report_url(&self) -> String {
        format!("{}/report", self.callback_url.trim_end_matches('/'))
    }

    /// Send one heartbeat.
    pub async fn send(&self, detail: &str) -> Result<(), reqwest::Error> {
        let body = ReportRequest {
            endpoint: self.endpoint.clone(),
            detail: detail.to_string(),
        };
        let url = self.report_url();
        debug!("Sending heartbeat to {}", url);
        self.client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Send a heartbeat every `interval` until the task is dropped.
    /// Failures are logged and the loop carries on.
    pub async fn run(&self, interval: Duration, mut detail: impl FnMut() -> String) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.send(&detail()).await {
                warn!("Heartbeat to {} failed: {}", self.callback_url, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_url_is_joined_once() {
        let reporter =
            HeartbeatReporter::new("http://127.0.0.1:7860/", "http://127.0.0.1:9001").unwrap();
        assert_eq!(reporter.report_url(), "http://127.0.0.1:7860/report");
    }
}
