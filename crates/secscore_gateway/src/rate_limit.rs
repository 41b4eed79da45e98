//! Sliding one-hour-window rate limiter, per client IP.
//!
//! No token-bucket crate is in the dependency stack, so this mirrors the
//! teacher's `ServerStats`-style `Arc<RwLock<HashMap<...>>>` counters: each
//! IP gets a timestamp bucket, pruned opportunistically on every check.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::RwLock;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60 * 60);

pub struct RateLimiter {
    buckets: RwLock<HashMap<IpAddr, Vec<Instant>>>,
    limit_per_hour: u32,
}

impl RateLimiter {
    pub fn new(limit_per_hour: u32) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            limit_per_hour,
        }
    }

    /// Records a request from `ip` and reports whether it should be allowed.
    /// Prunes timestamps older than the window as a side effect.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut buckets = self
            .buckets
            .write()
            .expect("RateLimiter: buckets lock poisoned");

        let bucket = buckets.entry(ip).or_default();
        bucket.retain(|seen| now.duration_since(*seen) < WINDOW);

        if bucket.len() as u32 >= self.limit_per_hour {
            return false;
        }

        bucket.push(now);
        true
    }

    /// Number of distinct IPs with at least one timestamp currently tracked;
    /// exposed for `/api/health`. Stale entries are not proactively swept,
    /// only pruned lazily on `check`, so this is an upper bound.
    pub fn active_buckets(&self) -> usize {
        self.buckets
            .read()
            .expect("RateLimiter: buckets lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
    }

    #[test]
    fn allows_requests_under_the_limit() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.check(ip()));
        assert!(limiter.check(ip()));
        assert!(limiter.check(ip()));
    }

    #[test]
    fn rejects_requests_over_the_limit() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.check(ip()));
        assert!(limiter.check(ip()));
        assert!(!limiter.check(ip()));
    }

    #[test]
    fn tracks_ips_independently() {
        let limiter = RateLimiter::new(1);
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(limiter.check(a));
        assert!(limiter.check(b));
        assert!(!limiter.check(a));
    }

    #[test]
    fn active_buckets_counts_distinct_ips() {
        let limiter = RateLimiter::new(10);
        limiter.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        limiter.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(limiter.active_buckets(), 2);
    }
}
