//! The per-request fan-out: cache check, parallel upstream fetch, local KEV
//! and ExploitDB lookups, scoring, and response assembly. Shared by both
//! `/api/v1/cve/{cveId}` and `/api/v1/enrich/cve/{cveId}`.

use chrono::Utc;
use secscore_cache::{cve_key, enrich_key, CacheLookup};
use secscore_core::SecScoreResult;
use secscore_engine::{
    asymmetric_laplace_cdf, build_explanation, compute_secscore, infer_category, weeks_since,
    CveMetadata, ExplanationContext, ScoreInputs, SecScoreResponse, MODEL_VERSION,
};
use secscore_fetch::{epss, nvd, osv};

use crate::al_params;
use crate::state::AppState;

/// Fetches (or serves from cache) normalized NVD metadata only, for
/// `/api/v1/cve/{cveId}`.
pub async fn fetch_cve_metadata(
    state: &AppState,
    cve_id: &str,
) -> SecScoreResult<(CveMetadata, CacheLookup)> {
    let key = cve_key(cve_id);
    let (cached, lookup) = state.0.metadata_cache.get(&key, MODEL_VERSION);
    if let Some(mut metadata) = cached {
        if lookup == CacheLookup::StaleModelVersion {
            metadata.model_version = MODEL_VERSION.to_string();
        }
        return Ok((metadata, lookup));
    }

    let metadata =
        nvd::fetch_metadata(&state.0.http_client, &state.0.fetch_policy, cve_id, MODEL_VERSION)
            .await?;
    state.0.metadata_cache.put(key, metadata.clone(), MODEL_VERSION);
    Ok((metadata, CacheLookup::Miss))
}

/// Fetches (or serves from cache) the full SecScore response, for
/// `/api/v1/enrich/cve/{cveId}`.
pub async fn enrich(state: &AppState, cve_id: &str) -> SecScoreResult<(SecScoreResponse, CacheLookup)> {
    let key = enrich_key(cve_id);
    let (cached, lookup) = state.0.enrich_cache.get(&key, MODEL_VERSION);
    if let Some(mut response) = cached {
        if lookup == CacheLookup::StaleModelVersion {
            response.model_version = MODEL_VERSION.to_string();
        }
        return Ok((response, lookup));
    }

    let (metadata_result, epss_signal, osv_packages) = tokio::join!(
        nvd::fetch_metadata(&state.0.http_client, &state.0.fetch_policy, cve_id, MODEL_VERSION),
        epss::fetch_epss(&state.0.http_client, &state.0.fetch_policy, cve_id),
        osv::fetch_osv(&state.0.http_client, &state.0.fetch_policy, cve_id),
    );
    let metadata = metadata_result?;

    let kev = state.0.kev.is_member(cve_id).await;
    let exploits = state.0.exploitdb.lookup(cve_id);

    let cpes: Vec<String> = metadata.cpe.iter().cloned().collect();
    let category = infer_category(&cpes);
    let params = *al_params::params_for(&state.0.al_params, category.as_str());

    let now = Utc::now();
    let weeks = weeks_since(metadata.published_date, now);
    let exploit_prob = asymmetric_laplace_cdf(weeks, params.mu, params.lambda, params.kappa);

    let inputs = ScoreInputs {
        cvss_base: metadata.cvss_base,
        remediation_level: metadata.temporal.remediation_level,
        report_confidence: metadata.temporal.report_confidence,
        cvss_version: metadata.cvss_version.clone(),
        weeks,
        exploit_prob,
        epss_score: epss_signal.as_ref().map(|e| e.score),
        has_exploit: !exploits.is_empty(),
        kev,
    };
    let computation = compute_secscore(&inputs);

    let explanation = build_explanation(&ExplanationContext {
        category: category.as_str(),
        params,
        kev,
        exploits: &exploits,
        epss_score: epss_signal.as_ref().map(|e| e.score),
        epss_percentile: epss_signal.as_ref().map(|e| e.percentile),
        cvss_base: metadata.cvss_base,
        computation: &computation,
    });

    let response = SecScoreResponse {
        cve_id: metadata.cve_id.clone(),
        published_date: metadata.published_date,
        cvss_base: metadata.cvss_base,
        cvss_vector: metadata.cvss_vector.clone(),
        secscore: computation.secscore,
        exploit_prob: computation.exploit_prob,
        model_category: category.to_string(),
        model_params: params,
        epss: epss_signal,
        exploits,
        kev,
        osv: osv_packages,
        explanation,
        computed_at: now,
        model_version: MODEL_VERSION.to_string(),
    };

    state.0.enrich_cache.put(key, response.clone(), MODEL_VERSION);
    Ok((response, CacheLookup::Miss))
}
