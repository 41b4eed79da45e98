//! FIRST EPSS API fetcher and decoder.

use chrono::Utc;
use reqwest::Client;
use secscore_engine::EpssSignal;
use serde::Deserialize;

use crate::retry::{get_with_retry, FetchPolicy};

const EPSS_BASE_URL: &str = "https://api.first.org/data/v1/epss";

#[derive(Debug, Deserialize)]
struct EpssApiResponse {
    #[serde(default)]
    data: Vec<EpssRecord>,
}

#[derive(Debug, Deserialize)]
struct EpssRecord {
    cve: String,
    epss: String,
    percentile: String,
}

/// Fetch the EPSS score/percentile for a CVE. Any upstream failure, a
/// missing record, or an unparsable numeric field yields `None` rather than
/// propagating an error — EPSS is a soft signal.
pub async fn fetch_epss(client: &Client, policy: &FetchPolicy, cve_id: &str) -> Option<EpssSignal> {
    let url = format!("{EPSS_BASE_URL}?cve={cve_id}");

    let response = match get_with_retry(client, &url, policy).await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::debug!(cve_id, status = %r.status(), "EPSS returned non-success status");
            return None;
        }
        Err(err) => {
            tracing::warn!(cve_id, error = %err, "EPSS fetch failed");
            return None;
        }
    };

    let body: EpssApiResponse = match response.json().await {
        Ok(b) => b,
        Err(err) => {
            tracing::warn!(cve_id, error = %err, "EPSS response failed to decode");
            return None;
        }
    };

    let record = body.data.into_iter().find(|r| r.cve == cve_id)?;

    let score: f64 = record.epss.parse().ok()?;
    let percentile: f64 = record.percentile.parse().ok()?;
    if score.is_nan() || percentile.is_nan() {
        return None;
    }

    Some(EpssSignal {
        score,
        percentile,
        fetched_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_string_encoded_floats() {
        let record = EpssRecord {
            cve: "CVE-2024-0001".to_string(),
            epss: "0.42000".to_string(),
            percentile: "0.90000".to_string(),
        };
        assert_eq!(record.epss.parse::<f64>().unwrap(), 0.42);
        assert_eq!(record.percentile.parse::<f64>().unwrap(), 0.9);
    }
}
