//! Shared transport policy for upstream fetchers: timeout, retry+jitter,
//! common headers. Per-source decoding lives in each fetcher module.

use std::time::Duration;

use rand::Rng;
use reqwest::{Client, Response, StatusCode};

const USER_AGENT: &str = concat!("secscore/", env!("CARGO_PKG_VERSION"));

/// Transport policy for one upstream source.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub timeout: Duration,
    /// Number of *additional* attempts beyond the first.
    pub retries: u32,
    pub jitter: (Duration, Duration),
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retries: 2,
            jitter: (Duration::from_millis(200), Duration::from_millis(400)),
        }
    }
}

pub fn build_client(policy: &FetchPolicy) -> reqwest::Result<Client> {
    Client::builder().timeout(policy.timeout).build()
}

/// GET `url` with the shared retry policy. Any failure except a 404 is
/// retried up to `policy.retries` additional times with uniform jitter
/// between attempts; a 404 bubbles up immediately since it's meaningful
/// ("not found"), not transient.
pub async fn get_with_retry(
    client: &Client,
    url: &str,
    policy: &FetchPolicy,
) -> Result<Response, reqwest::Error> {
    let mut attempt = 0;
    loop {
        let result = client
            .get(url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::NOT_FOUND => return Ok(response),
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) if attempt >= policy.retries => return Ok(response),
            Err(err) if attempt >= policy.retries => return Err(err),
            _ => {
                attempt += 1;
                tracing::warn!(url, attempt, "upstream fetch failed, retrying");
                tokio::time::sleep(jitter_delay(policy)).await;
            }
        }
    }
}

fn jitter_delay(policy: &FetchPolicy) -> Duration {
    let (min, max) = policy.jitter;
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis().max(min.as_millis() + 1) as u64;
    let ms = rand::thread_rng().gen_range(min_ms..max_ms);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_has_two_retries_and_five_second_timeout() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.timeout, Duration::from_secs(5));
    }

    #[test]
    fn jitter_delay_stays_within_bounds() {
        let policy = FetchPolicy::default();
        for _ in 0..50 {
            let d = jitter_delay(&policy);
            assert!(d >= policy.jitter.0 && d < policy.jitter.1);
        }
    }
}
