//! `/api/health`: process uptime, best-effort memory, KEV dataset freshness,
//! and rate-limiter load. Supplements spec.md §6's named fields with the
//! superset described in SPEC_FULL.md §8.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use secscore_core::platform;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RateLimiterHealth {
    active_buckets: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    #[serde(rename = "uptimeSeconds")]
    uptime_seconds: u64,
    #[serde(rename = "rssBytes")]
    rss_bytes: Option<u64>,
    os: &'static str,
    arch: &'static str,
    #[serde(rename = "kevDatasetUpdatedAt")]
    kev_dataset_updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "rateLimiter")]
    rate_limiter: RateLimiterHealth,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let kev_snapshot = state.0.kev.current().await;

    Json(HealthResponse {
        status: "ok",
        version: state.model_version(),
        uptime_seconds: state.0.start_time.elapsed().as_secs(),
        rss_bytes: platform::resident_memory_bytes(),
        os: platform::os(),
        arch: platform::arch(),
        kev_dataset_updated_at: kev_snapshot.updated_at,
        rate_limiter: RateLimiterHealth {
            active_buckets: state.0.rate_limiter.active_buckets(),
        },
    })
}
