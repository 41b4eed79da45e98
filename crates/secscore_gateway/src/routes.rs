//! Route handlers and router assembly for the four HTTP endpoints.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use secscore_cache::CacheLookup;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::captcha::{self, CaptchaOutcome};
use crate::error::ApiError;
use crate::health;
use crate::orchestrator;
use crate::state::{fallback_ip, AppState};
use crate::validation::normalize_cve_id;

const CAPTCHA_HEADER: &str = "x-captcha-token";
const CRON_SECRET_HEADER: &str = "x-cron-secret";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/cve/:cve_id", get(get_cve_metadata))
        .route("/api/v1/enrich/cve/:cve_id", get(get_enrichment))
        .route("/api/internal/refresh-kev", post(refresh_kev).get(refresh_kev))
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
}

fn request_id() -> String {
    Uuid::new_v4().to_string()
}

fn client_ip(connect_info: Option<&ConnectInfo<SocketAddr>>) -> IpAddr {
    connect_info.map(|c| c.0.ip()).unwrap_or_else(fallback_ip)
}

fn cache_header_value(lookup: CacheLookup) -> &'static str {
    match lookup {
        CacheLookup::Hit | CacheLookup::StaleModelVersion => "HIT",
        CacheLookup::Miss => "MISS",
    }
}

async fn get_cve_metadata(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Path(raw_cve_id): Path<String>,
) -> Result<Response, ApiError> {
    let request_id = request_id();
    let span = tracing::info_span!("cve_metadata", request_id = %request_id, cve_id = %raw_cve_id);
    let _enter = span.enter();

    let ip = client_ip(connect_info.as_ref());
    if !state.0.rate_limiter.check(ip) {
        return Err(ApiError::rate_limited(&request_id));
    }

    let cve_id = normalize_cve_id(&raw_cve_id)
        .ok_or_else(|| ApiError::bad_request("invalid CVE identifier", &request_id))?;

    state.ensure_kev_ready().await;

    let (metadata, lookup) = orchestrator::fetch_cve_metadata(&state, &cve_id)
        .await
        .map_err(|err| ApiError::from_upstream(err, &request_id))?;

    Ok((
        StatusCode::OK,
        [
            ("X-Request-Id", request_id.clone()),
            ("SecScore-Model-Version", state.model_version().to_string()),
            ("X-Cache", cache_header_value(lookup).to_string()),
            (
                "Cache-Control",
                "public, max-age=3600, stale-while-revalidate=86400".to_string(),
            ),
        ],
        Json(metadata),
    )
        .into_response())
}

async fn get_enrichment(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Path(raw_cve_id): Path<String>,
) -> Result<Response, ApiError> {
    let request_id = request_id();
    let span = tracing::info_span!("enrich", request_id = %request_id, cve_id = %raw_cve_id);
    let _enter = span.enter();

    let ip = client_ip(connect_info.as_ref());
    if !state.0.rate_limiter.check(ip) {
        return Err(ApiError::rate_limited(&request_id));
    }

    let cve_id = normalize_cve_id(&raw_cve_id)
        .ok_or_else(|| ApiError::bad_request("invalid CVE identifier", &request_id))?;

    if state.0.settings.captcha.enabled {
        let secret = state
            .0
            .settings
            .captcha
            .secret_key
            .as_deref()
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "captcha misconfigured",
                    &request_id,
                )
            })?;
        let token = headers
            .get(CAPTCHA_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::bad_request("missing CAPTCHA token header", &request_id))?;

        match captcha::verify(&state.0.http_client, secret, token).await {
            CaptchaOutcome::Passed => {}
            CaptchaOutcome::Failed(codes) => {
                return Err(ApiError::captcha_failed(codes, &request_id));
            }
        }
    }

    state.ensure_kev_ready().await;

    let (response, lookup) = orchestrator::enrich(&state, &cve_id)
        .await
        .map_err(|err| ApiError::from_upstream(err, &request_id))?;

    let kev_updated_at = state
        .0
        .kev
        .current()
        .await
        .updated_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    Ok((
        StatusCode::OK,
        [
            ("X-Request-Id", request_id.clone()),
            ("SecScore-Model-Version", state.model_version().to_string()),
            ("X-Cache", cache_header_value(lookup).to_string()),
            (
                "Cache-Control",
                "public, max-age=3600, stale-while-revalidate=86400".to_string(),
            ),
            ("X-KEV-Updated-At", kev_updated_at),
        ],
        Json(response),
    )
        .into_response())
}

async fn refresh_kev(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let request_id = request_id();

    let configured = state.0.settings.internal_refresh_secret.as_deref();
    let provided = headers.get(CRON_SECRET_HEADER).and_then(|v| v.to_str().ok());

    let authorized = matches!((configured, provided), (Some(c), Some(p)) if !c.is_empty() && c == p);
    if !authorized {
        return Err(ApiError::unauthorized("invalid or missing x-cron-secret", &request_id));
    }

    state.ensure_kev_ready().await;
    let outcome = state.0.kev.refresh(&state.0.http_client).await;

    Ok((
        StatusCode::OK,
        [("X-Request-Id", request_id)],
        Json(serde_json::json!({ "changed": outcome.changed })),
    )
        .into_response())
}
