//! Proxy addresses, probe results and round-robin partitioning.

use std::time::Duration;

/// Candidate standing for "connect directly, without a proxy".
pub const NONE_SENTINEL: &str = "none";

/// Whether `proxy` is the direct-connection sentinel.
pub fn is_none_sentinel(proxy: &str) -> bool {
    proxy.trim().eq_ignore_ascii_case(NONE_SENTINEL)
}

/// Split a persisted comma-separated proxy string into addresses.
pub fn parse_proxy_string(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Candidate list for a dispatch batch: the sentinel first, then every
/// configured proxy, so proxy-less operation is always on offer.
pub fn candidate_list(raw: &str) -> Vec<String> {
    let mut candidates = vec![NONE_SENTINEL.to_string()];
    candidates.extend(parse_proxy_string(raw));
    candidates
}

/// Wrap a vendor `host:port` with credentials.
pub fn with_credentials(host_port: &str, username: &str, password: &str) -> String {
    format!("http://{}:{}@{}", username, password, host_port.trim())
}

/// Deal `proxies` round-robin into `slices` disjoint lists.
///
/// Element `i` lands in slice `i % slices`. When there are fewer proxies than
/// slices the trailing slices are empty.
pub fn split_round_robin(proxies: &[String], slices: usize) -> Vec<Vec<String>> {
    let mut assigned: Vec<Vec<String>> = vec![Vec::new(); slices];
    if slices == 0 {
        return assigned;
    }
    for (i, proxy) in proxies.iter().enumerate() {
        assigned[i % slices].push(proxy.clone());
    }
    assigned
}

/// Convert a proxy address into a `reqwest::Proxy`.
pub fn to_reqwest_proxy(proxy: &str) -> Result<reqwest::Proxy, reqwest::Error> {
    reqwest::Proxy::all(proxy)
}

/// Outcome of probing a single proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// The proxy that was probed.
    pub proxy: String,
    /// Measured round-trip time, `None` when unreachable.
    pub rtt: Option<Duration>,
}

impl ProbeResult {
    /// Successful check that took `rtt`.
    pub fn reachable(proxy: impl Into<String>, rtt: Duration) -> Self {
        Self {
            proxy: proxy.into(),
            rtt: Some(rtt),
        }
    }

    /// Failed check.
    pub fn unreachable(proxy: impl Into<String>) -> Self {
        Self {
            proxy: proxy.into(),
            rtt: None,
        }
    }

    /// Whether the proxy answered the check.
    pub fn is_reachable(&self) -> bool {
        self.rtt.is_some()
    }

    /// Latency in seconds, infinite when unreachable.
    pub fn rtt_secs(&self) -> f64 {
        self.rtt.map_or(f64::INFINITY, |rtt| rtt.as_secs_f64())
    }

    /// Short status used in proxy check tables.
    pub fn label(&self) -> String {
        match self.rtt {
            Some(rtt) => format!("{:.2}s", rtt.as_secs_f64()),
            None => "unreachable".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn candidate_list_puts_sentinel_first() {
        assert_eq!(candidate_list("a,b,c"), strings(&["none", "a", "b", "c"]));
        assert_eq!(candidate_list(" a , ,b "), strings(&["none", "a", "b"]));
        assert_eq!(candidate_list(""), strings(&["none"]));
    }

    #[test]
    fn sentinel_is_case_insensitive() {
        assert!(is_none_sentinel("none"));
        assert!(is_none_sentinel(" NONE "));
        assert!(!is_none_sentinel("http://none:1"));
    }

    #[test]
    fn split_is_a_disjoint_round_robin_partition() {
        let proxies = strings(&["none", "a", "b", "c", "d"]);
        let slices = split_round_robin(&proxies, 2);
        assert_eq!(slices, vec![strings(&["none", "b", "d"]), strings(&["a", "c"])]);

        for n in 1..=7 {
            let slices = split_round_robin(&proxies, n);
            assert_eq!(slices.len(), n);
            let mut rebuilt = Vec::new();
            let longest = slices.iter().map(Vec::len).max().unwrap_or(0);
            for row in 0..longest {
                for slice in &slices {
                    if let Some(p) = slice.get(row) {
                        rebuilt.push(p.clone());
                    }
                }
            }
            assert_eq!(rebuilt, proxies, "n = {}", n);
        }
    }

    #[test]
    fn split_with_more_slices_than_proxies_leaves_empty_tail() {
        let slices = split_round_robin(&strings(&["none", "a"]), 4);
        assert_eq!(slices[0], strings(&["none"]));
        assert_eq!(slices[1], strings(&["a"]));
        assert!(slices[2].is_empty());
        assert!(slices[3].is_empty());
        assert!(split_round_robin(&strings(&["a"]), 0).is_empty());
    }

    #[test]
    fn credentials_are_wrapped_into_http_url() {
        assert_eq!(
            with_credentials("1.2.3.4:8080 ", "u", "p"),
            "http://u:p@1.2.3.4:8080"
        );
    }

    #[test]
    fn probe_result_labels() {
        let ok = ProbeResult::reachable("a", Duration::from_millis(120));
        assert_eq!(ok.label(), "0.12s");
        let dead = ProbeResult::unreachable("b");
        assert!(!dead.is_reachable());
        assert!(dead.rtt_secs().is_infinite());
    }
}
