//! # secscore_cache
//!
//! A capacity-bounded, TTL-expiring LRU cache for `/api/v1/cve/{cveId}` and
//! `/api/v1/enrich/cve/{cveId}` responses. Entries carry the model version
//! they were computed under; a lookup under a newer model version still
//! returns the cached value but rewrites the entry's tag in place.

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;

/// Default time-to-live for a cached entry (24 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default maximum number of entries held at once.
pub const DEFAULT_CAPACITY: usize = 2_000;

/// Builds the semantic cache key for the plain CVE metadata lookup.
pub fn cve_key(cve_id: &str) -> String {
    format!("cve:{cve_id}")
}

/// Builds the semantic cache key for the enriched SecScore lookup.
pub fn enrich_key(cve_id: &str) -> String {
    format!("enrich:{cve_id}")
}

#[derive(Debug, Clone)]
struct CachedEntry<V> {
    value: V,
    model_version: String,
    cached_at: Instant,
    ttl: Duration,
}

impl<V> CachedEntry<V> {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// Cache hit/miss/eviction counters, exposed for the health endpoint.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub stale_model_rewrites: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheMetrics {
    /// Hit rate in `[0, 1]`; `0.0` when nothing has been looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Outcome of a cache lookup. `StaleModelVersion` is still a hit — the
/// stored value is returned — but its tag was just rewritten to the
/// current model version so later lookups report a plain `Hit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
    StaleModelVersion,
}

/// Generic response cache, used once for `CveMetadata` and once for
/// `SecScoreResponse` by the orchestrator.
pub struct ResponseCache<V> {
    entries: Arc<RwLock<LruCache<String, CachedEntry<V>>>>,
    metrics: Arc<RwLock<CacheMetrics>>,
    default_ttl: Duration,
    capacity: usize,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_capacity_and_ttl(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            entries: Arc::new(RwLock::new(LruCache::new(cap))),
            metrics: Arc::new(RwLock::new(CacheMetrics {
                capacity,
                ..Default::default()
            })),
            default_ttl: ttl,
            capacity,
        }
    }

    /// Looks up `key`. A stored entry whose model version doesn't match
    /// `current_model_version` is still returned — its tag is rewritten to
    /// the current version in place, per the "rewrite on retrieval" rule,
    /// rather than discarded and forced to recompute.
    pub fn get(&self, key: &str, current_model_version: &str) -> (Option<V>, CacheLookup) {
        let mut entries = self
            .entries
            .write()
            .expect("ResponseCache: entries lock poisoned");
        let mut metrics = self
            .metrics
            .write()
            .expect("ResponseCache: metrics lock poisoned");

        let Some(entry) = entries.get_mut(key) else {
            metrics.misses += 1;
            return (None, CacheLookup::Miss);
        };

        if entry.is_expired() {
            entries.pop(key);
            metrics.misses += 1;
            metrics.evictions += 1;
            return (None, CacheLookup::Miss);
        }

        if entry.model_version != current_model_version {
            entry.model_version = current_model_version.to_string();
            let value = entry.value.clone();
            metrics.hits += 1;
            metrics.stale_model_rewrites += 1;
            return (Some(value), CacheLookup::StaleModelVersion);
        }

        metrics.hits += 1;
        (Some(entry.value.clone()), CacheLookup::Hit)
    }

    /// Inserts or overwrites `key` with `value`, tagged with the model
    /// version it was computed under and the cache's default TTL.
    pub fn put(&self, key: String, value: V, model_version: &str) {
        let mut entries = self
            .entries
            .write()
            .expect("ResponseCache: entries lock poisoned");
        let mut metrics = self
            .metrics
            .write()
            .expect("ResponseCache: metrics lock poisoned");

        if entries.len() >= self.capacity && !entries.contains(&key) {
            metrics.evictions += 1;
        }

        entries.put(
            key,
            CachedEntry {
                value,
                model_version: model_version.to_string(),
                cached_at: Instant::now(),
                ttl: self.default_ttl,
            },
        );
        metrics.size = entries.len();
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.metrics
            .read()
            .expect("ResponseCache: metrics lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("ResponseCache: entries lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
