//! Single-proxy reachability probe.

use crate::config::DEFAULT_PROBE_URL;
use crate::proxy::{to_reqwest_proxy, ProbeResult};

use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Measures whether a proxy can reach the target and how fast.
///
/// Implementations never fail: every problem is folded into an unreachable
/// `ProbeResult`, so one dead proxy cannot abort a batch.
#[async_trait]
pub trait ProxyProbe: Send + Sync {
    async fn check(&self, proxy: &str, timeout: Duration) -> ProbeResult;
}

/// Probe that issues a GET to `target_url` through the proxy.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    target_url: String,
}

impl HttpProbe {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_URL)
    }
}

#[async_trait]
impl ProxyProbe for HttpProbe {
    async fn check(&self, proxy: &str, timeout: Duration) -> ProbeResult {
        check(proxy, &self.target_url, timeout).await
    }
}

/// Probe `proxy` once against `target_url`.
///
/// Half of `timeout` goes to connection setup and half to reading the
/// response. Only a 200 counts as reachable.
pub async fn check(proxy: &str, target_url: &str, timeout: Duration) -> ProbeResult {
    let half = timeout / 2;

    let reqwest_proxy = match to_reqwest_proxy(proxy) {
        Ok(p) => p,
        Err(e) => {
            warn!("Proxy {} is not a valid proxy url: {}", proxy, e);
            return ProbeResult::unreachable(proxy);
        }
    };

    let client = match reqwest::Client::builder()
        .proxy(reqwest_proxy)
        .connect_timeout(half)
        .read_timeout(half)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build probe client for {}: {}", proxy, e);
            return ProbeResult::unreachable(proxy);
        }
    };

    let start = Instant::now();
    match client.get(target_url).send().await {
        Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
            let elapsed = start.elapsed();
            info!("Proxy {} reachable in {:.2}s", proxy, elapsed.as_secs_f64());
            ProbeResult::reachable(proxy, elapsed)
        }
        Ok(resp) => {
            warn!("Proxy {} answered with status {}", proxy, resp.status());
            ProbeResult::unreachable(proxy)
        }
        Err(e) if e.is_timeout() => {
            warn!("Proxy {} timed out: {}", proxy, e);
            ProbeResult::unreachable(proxy)
        }
        Err(e) => {
            debug!("Proxy {} request failed: {:?}", proxy, e);
            warn!("Proxy {} request failed: {}", proxy, e);
            ProbeResult::unreachable(proxy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::Router;

    /// Plain-HTTP proxy answering every forwarded request with `status`.
    async fn proxy_answering(status: StatusCode) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(move || async move { status });
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn invalid_proxy_url_is_unreachable() {
        let probe = HttpProbe::new("http://127.0.0.1:1/");
        let result = probe.check("not a proxy url", Duration::from_millis(200)).await;
        assert!(!result.is_reachable());
        assert_eq!(result.proxy, "not a proxy url");
    }

    #[tokio::test]
    async fn refused_proxy_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let proxy = format!("http://127.0.0.1:{}", port);
        let result = check(&proxy, "http://example.com/", Duration::from_millis(500)).await;
        assert!(!result.is_reachable());
        assert!(result.rtt_secs().is_infinite());
    }

    #[tokio::test]
    async fn only_200_counts_as_reachable() {
        let ok_proxy = proxy_answering(StatusCode::OK).await;
        let no_content_proxy = proxy_answering(StatusCode::NO_CONTENT).await;
        let target = "http://target.invalid/";

        let ok = check(&ok_proxy, target, Duration::from_secs(2)).await;
        assert!(ok.is_reachable());
        assert!(ok.rtt.is_some());

        let no_content = check(&no_content_proxy, target, Duration::from_secs(2)).await;
        assert!(!no_content.is_reachable());
        assert!(no_content.rtt_secs().is_infinite());
    }

    #[test]
    fn default_probe_targets_the_service() {
        assert_eq!(HttpProbe::default().target_url(), DEFAULT_PROBE_URL);
    }
}
