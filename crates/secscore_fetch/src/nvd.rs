//! NVD CVE 2.0 API fetcher and decoder.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use secscore_core::{SecScoreError, SecScoreResult};
use secscore_engine::{cvss, CveMetadata, TemporalMultipliers};
use serde::Deserialize;

use crate::retry::{get_with_retry, FetchPolicy};

const NVD_BASE_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

#[derive(Debug, Deserialize)]
struct NvdApiResponse {
    #[serde(default)]
    vulnerabilities: Vec<NvdVulnerability>,
}

#[derive(Debug, Deserialize)]
struct NvdVulnerability {
    cve: NvdCve,
}

#[derive(Debug, Deserialize)]
struct NvdCve {
    id: String,
    published: Option<String>,
    #[serde(default)]
    descriptions: Vec<NvdDescription>,
    #[serde(default)]
    metrics: NvdMetrics,
    #[serde(default)]
    configurations: Vec<NvdConfiguration>,
}

#[derive(Debug, Deserialize)]
struct NvdDescription {
    lang: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct NvdMetrics {
    #[serde(rename = "cvssMetricV40", default)]
    cvss_metric_v40: Vec<NvdCvssMetric>,
    #[serde(rename = "cvssMetricV31", default)]
    cvss_metric_v31: Vec<NvdCvssMetric>,
    #[serde(rename = "cvssMetricV30", default)]
    cvss_metric_v30: Vec<NvdCvssMetric>,
    #[serde(rename = "cvssMetricV2", default)]
    cvss_metric_v2: Vec<NvdCvssMetric>,
}

#[derive(Debug, Deserialize)]
struct NvdCvssMetric {
    #[serde(rename = "cvssData")]
    cvss_data: NvdCvssData,
}

#[derive(Debug, Deserialize)]
struct NvdCvssData {
    version: String,
    #[serde(rename = "vectorString")]
    vector_string: String,
    #[serde(rename = "baseScore")]
    base_score: Option<f64>,
    score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct NvdConfiguration {
    #[serde(default)]
    nodes: Vec<NvdNode>,
}

#[derive(Debug, Default, Deserialize)]
struct NvdNode {
    #[serde(rename = "cpeMatch", default)]
    cpe_match: Vec<NvdCpeMatch>,
    #[serde(default)]
    children: Vec<NvdNode>,
}

#[derive(Debug, Deserialize)]
struct NvdCpeMatch {
    criteria: String,
}

/// Fetch and normalize a single CVE's NVD metadata.
///
/// Absent record surfaces as [`SecScoreError::NotFound`]. Any other upstream
/// failure degrades to a defaulted record so the caller can keep serving a
/// partial response rather than failing outright.
pub async fn fetch_metadata(
    client: &Client,
    policy: &FetchPolicy,
    cve_id: &str,
    model_version: &str,
) -> SecScoreResult<CveMetadata> {
    let url = format!("{NVD_BASE_URL}?cveId={cve_id}");

    let response = match get_with_retry(client, &url, policy).await {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(cve_id, error = %err, "NVD fetch failed after retries");
            return Ok(CveMetadata::defaulted(cve_id, model_version));
        }
    };

    if response.status() == StatusCode::NOT_FOUND {
        return Err(SecScoreError::NotFound);
    }
    if !response.status().is_success() {
        tracing::warn!(cve_id, status = %response.status(), "NVD returned non-success status");
        return Ok(CveMetadata::defaulted(cve_id, model_version));
    }

    let body: NvdApiResponse = match response.json().await {
        Ok(b) => b,
        Err(err) => {
            tracing::warn!(cve_id, error = %err, "NVD response failed to decode");
            return Ok(CveMetadata::defaulted(cve_id, model_version));
        }
    };

    let mut cves: Vec<NvdCve> = body.vulnerabilities.into_iter().map(|v| v.cve).collect();
    let exact_index = cves.iter().position(|c| c.id == cve_id);
    let found = match exact_index {
        Some(i) => Some(cves.swap_remove(i)),
        None if !cves.is_empty() => Some(cves.swap_remove(0)),
        None => None,
    };

    let cve = match found {
        Some(c) => c,
        None => return Err(SecScoreError::NotFound),
    };

    Ok(normalize(cve, model_version))
}

fn normalize(cve: NvdCve, model_version: &str) -> CveMetadata {
    let description = cve
        .descriptions
        .iter()
        .find(|d| d.lang == "en")
        .or_else(|| cve.descriptions.first())
        .map(|d| d.value.clone());

    let published_date = cve
        .published
        .as_deref()
        .and_then(parse_nvd_timestamp);

    let (cvss_version, cvss_base, cvss_vector) = select_cvss(&cve.metrics);

    let temporal = cvss_vector
        .as_deref()
        .and_then(cvss::parse_vector)
        .map(|parsed| TemporalMultipliers {
            remediation_level: parsed.metrics.get("RL").and_then(|c| cvss::remediation_level(c)),
            report_confidence: parsed.metrics.get("RC").and_then(|c| cvss::report_confidence(c)),
        })
        .unwrap_or_default();

    let cpe = collect_cpe(&cve.configurations);

    CveMetadata {
        cve_id: cve.id,
        published_date,
        description,
        cvss_base,
        cvss_vector,
        cvss_version,
        cpe,
        temporal,
        model_version: model_version.to_string(),
    }
}

/// CVSS metric selection priority: v4.0 -> v3.1 -> v3.0 -> v2.
fn select_cvss(metrics: &NvdMetrics) -> (Option<String>, Option<f64>, Option<String>) {
    let pick = |entries: &[NvdCvssMetric]| -> Option<(String, f64, String)> {
        entries.first().map(|m| {
            let score = m.cvss_data.base_score.or(m.cvss_data.score).unwrap_or(0.0);
            (
                m.cvss_data.version.clone(),
                score,
                m.cvss_data.vector_string.clone(),
            )
        })
    };

    let selected = pick(&metrics.cvss_metric_v40)
        .or_else(|| pick(&metrics.cvss_metric_v31))
        .or_else(|| pick(&metrics.cvss_metric_v30))
        .or_else(|| pick(&metrics.cvss_metric_v2));

    match selected {
        Some((version, score, vector)) => (Some(version), Some(score), Some(vector)),
        None => (None, None, None),
    }
}

fn collect_cpe(configurations: &[NvdConfiguration]) -> BTreeSet<String> {
    fn walk(node: &NvdNode, out: &mut BTreeSet<String>) {
        for m in &node.cpe_match {
            out.insert(m.criteria.clone());
        }
        for child in &node.children {
            walk(child, out);
        }
    }

    let mut out = BTreeSet::new();
    for config in configurations {
        for node in &config.nodes {
            walk(node, &mut out);
        }
    }
    out
}

fn parse_nvd_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // NVD timestamps are naive ("2018-01-18T23:29:00.213") without a zone
    // offset; NVD publishes in UTC.
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_naive_nvd_timestamp() {
        let parsed = parse_nvd_timestamp("2018-01-18T23:29:00.213").unwrap();
        assert_eq!(parsed.to_string(), "2018-01-18 23:29:00.213 UTC");
    }

    #[test]
    fn selects_v31_over_v2_when_both_present() {
        let metrics = NvdMetrics {
            cvss_metric_v40: vec![],
            cvss_metric_v31: vec![NvdCvssMetric {
                cvss_data: NvdCvssData {
                    version: "3.1".to_string(),
                    vector_string: "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H".to_string(),
                    base_score: Some(9.8),
                    score: None,
                },
            }],
            cvss_metric_v30: vec![],
            cvss_metric_v2: vec![NvdCvssMetric {
                cvss_data: NvdCvssData {
                    version: "2.0".to_string(),
                    vector_string: "AV:N/AC:L/Au:N/C:C/I:C/A:C".to_string(),
                    base_score: Some(10.0),
                    score: None,
                },
            }],
        };
        let (version, score, _) = select_cvss(&metrics);
        assert_eq!(version, Some("3.1".to_string()));
        assert_eq!(score, Some(9.8));
    }

    #[test]
    fn collect_cpe_walks_nested_children() {
        let configs = vec![NvdConfiguration {
            nodes: vec![NvdNode {
                cpe_match: vec![NvdCpeMatch {
                    criteria: "cpe:2.3:a:php:php:8.2".to_string(),
                }],
                children: vec![NvdNode {
                    cpe_match: vec![NvdCpeMatch {
                        criteria: "cpe:2.3:o:microsoft:windows_server:2022".to_string(),
                    }],
                    children: vec![],
                }],
            }],
        }];
        let cpe = collect_cpe(&configs);
        assert_eq!(cpe.len(), 2);
        assert!(cpe.contains("cpe:2.3:a:php:php:8.2"));
    }
}
