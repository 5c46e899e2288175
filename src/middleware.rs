//! Middleware routing a worker's requests through its assigned proxy slice.

use crate::config::MiddlewareConfig;
use crate::error::NoProxyAvailable;
use crate::proxy::{is_none_sentinel, parse_proxy_string, to_reqwest_proxy};

use anyhow::anyhow;
use async_trait::async_trait;
use log::{info, warn};
use parking_lot::Mutex;
use reqwest_middleware::{Error, Middleware, Next, Result};

/// Sends each request through the next proxy of the slice, round-robin.
///
/// `"none"` in the slice means a direct connection. A transport failure
/// moves on to the next proxy, up to `retry_count` extra attempts.
pub struct ProxySliceMiddleware {
    proxies: Vec<String>,
    config: MiddlewareConfig,
    next_index: Mutex<usize>,
}

impl ProxySliceMiddleware {
    pub fn new(proxies: Vec<String>, config: MiddlewareConfig) -> Self {
        Self {
            proxies,
            config,
            next_index: Mutex::new(0),
        }
    }

    /// Build from the comma-separated slice a worker was launched with.
    pub fn from_slice(slice: &str, config: MiddlewareConfig) -> Self {
        Self::new(parse_proxy_string(slice), config)
    }

    /// The proxy the next request will use.
    pub fn next_proxy(&self) -> std::result::Result<String, NoProxyAvailable> {
        if self.proxies.is_empty() {
            return Err(NoProxyAvailable);
        }
        let mut index = self.next_index.lock();
        let proxy = self.proxies[*index % self.proxies.len()].clone();
        *index = (*index + 1) % self.proxies.len();
        Ok(proxy)
    }

    fn client_for(&self, proxy: &str) -> std::result::Result<reqwest::Client, reqwest::Error> {
        let builder = reqwest::Client::builder().timeout(self.config.request_timeout);
        if is_none_sentinel(proxy) {
            builder.no_proxy().build()
        } else {
            builder.proxy(to_reqwest_proxy(proxy)?).build()
        }
    }
}

#[async_trait]
impl Middleware for ProxySliceMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        _extensions: &mut http::Extensions,
        _next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let max_retries = self.config.retry_count;
        let mut retry_count = 0;

        loop {
            let proxy = self
                .next_proxy()
                .map_err(|e| Error::Middleware(anyhow!(e)))?;

            let request = req.try_clone().ok_or_else(|| {
                Error::Middleware(anyhow!(
                    "Request object is not cloneable. Are you passing a streaming body?"
                ))
            })?;
            info!("Using proxy: {} (attempt {})", proxy, retry_count + 1);

            let outcome = match self.client_for(&proxy) {
                Ok(client) => client.execute(request).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(
                        "Request failed with proxy {} (attempt {}): {}",
                        proxy,
                        retry_count + 1,
                        err
                    );
                    retry_count += 1;
                    if retry_count > max_retries {
                        return Err(Error::Reqwest(err));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_through_the_slice() {
        let middleware = ProxySliceMiddleware::from_slice("none, http://a:1 ,http://b:2", MiddlewareConfig::default());
        let picked: Vec<String> = (0..4).map(|_| middleware.next_proxy().unwrap()).collect();
        assert_eq!(picked, vec!["none", "http://a:1", "http://b:2", "none"]);
    }

    #[test]
    fn empty_slice_has_no_proxy() {
        let middleware = ProxySliceMiddleware::from_slice("", MiddlewareConfig::default());
        assert!(middleware.next_proxy().is_err());
    }

    #[tokio::test]
    async fn falls_back_to_next_proxy_on_transport_error() {
        use axum::{routing::get, Router};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/", get(|| async { "ok" })))
                .await
                .unwrap();
        });

        let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_proxy = format!("http://{}", dead.local_addr().unwrap());
        drop(dead);

        let middleware = ProxySliceMiddleware::new(
            vec![dead_proxy, "none".to_string()],
            MiddlewareConfig {
                retry_count: 1,
                ..Default::default()
            },
        );
        let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
            .with(middleware)
            .build();

        let response = client.get(format!("http://{}/", addr)).send().await.unwrap();
        assert_eq!(response.text().await.unwrap(), "ok");
    }
}
