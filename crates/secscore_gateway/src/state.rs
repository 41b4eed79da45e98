//! The composition root's shared application state: every long-lived
//! service wired together once and handed to request handlers via
//! dependency injection, per spec.md §9's "prefer DI over implicit globals."

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;
use secscore_cache::ResponseCache;
use secscore_config::Settings;
use secscore_engine::{CveMetadata, ModelParams, SecScoreResponse, MODEL_VERSION};
use secscore_exploitdb::ExploitDbIndex;
use secscore_fetch::FetchPolicy;
use secscore_kev::{KevCatalog, KevScheduler};
use tokio::sync::Mutex;

use crate::al_params;
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState(pub Arc<Inner>);

pub struct Inner {
    pub settings: Settings,
    pub http_client: Client,
    pub fetch_policy: FetchPolicy,
    pub kev: Arc<KevCatalog>,
    pub scheduler: Mutex<Option<KevScheduler>>,
    pub exploitdb: ExploitDbIndex,
    pub al_params: HashMap<String, ModelParams>,
    pub metadata_cache: ResponseCache<CveMetadata>,
    pub enrich_cache: ResponseCache<SecScoreResponse>,
    pub rate_limiter: RateLimiter,
    pub start_time: Instant,
}

const BUNDLED_KEV_FALLBACK: &str = include_str!("../data/kev_fallback.json");
const BUNDLED_EXPLOITDB_INDEX: &str = include_str!("../data/exploitdb_index.json");

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let fetch_policy = FetchPolicy::default();
        let http_client =
            secscore_fetch::build_client(&fetch_policy).expect("reqwest client must build");

        let kev = Arc::new(KevCatalog::new(
            settings.kev.cache_path.clone(),
            Some(BUNDLED_KEV_FALLBACK),
        ));

        let cache_ttl = std::time::Duration::from_secs(settings.cache.ttl_seconds);
        let rate_limiter = RateLimiter::new(settings.rate_limit.requests_per_hour);

        let inner = Inner {
            http_client,
            fetch_policy,
            kev,
            scheduler: Mutex::new(None),
            exploitdb: ExploitDbIndex::load(BUNDLED_EXPLOITDB_INDEX),
            al_params: al_params::load_al_params(),
            metadata_cache: ResponseCache::with_capacity_and_ttl(settings.cache.capacity, cache_ttl),
            enrich_cache: ResponseCache::with_capacity_and_ttl(settings.cache.capacity, cache_ttl),
            rate_limiter,
            start_time: Instant::now(),
            settings,
        };

        Self(Arc::new(inner))
    }

    /// Bootstraps the KEV catalog and arms the refresh scheduler on first
    /// call; a no-op on every call after. Called at the top of every request
    /// handler rather than at startup, per spec.md §4.3's "armed on first
    /// request (lazy)".
    pub async fn ensure_kev_ready(&self) {
        if let Err(err) = self.0.kev.ensure_bootstrapped().await {
            tracing::error!(error = %err, "KEV bootstrap failed");
        }

        let mut scheduler = self.0.scheduler.lock().await;
        if scheduler.is_none() {
            let kill_switch = self.0.settings.kev.kill_switch;
            let interval_env = std::env::var("SECSCORE_KEV_REFRESH_INTERVAL_HOURS").ok();
            *scheduler = Some(KevScheduler::spawn(
                Arc::clone(&self.0.kev),
                self.0.http_client.clone(),
                interval_env,
                kill_switch,
            ));
        }
    }

    pub fn model_version(&self) -> &'static str {
        MODEL_VERSION
    }
}

/// Best-effort extraction of the caller's IP for rate limiting. Falls back
/// to a loopback address when nothing is available (e.g. a test client with
/// no `ConnectInfo`), which buckets all such callers together rather than
/// panicking.
pub fn fallback_ip() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}
