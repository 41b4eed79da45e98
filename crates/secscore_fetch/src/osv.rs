//! OSV.dev vulnerability fetcher and decoder.

use reqwest::{Client, StatusCode};
use secscore_engine::{OsvAffectedPackage, OsvEvent, OsvRange};
use serde::Deserialize;

use crate::retry::{get_with_retry, FetchPolicy};

const OSV_BASE_URL: &str = "https://api.osv.dev/v1/vulns";

#[derive(Debug, Deserialize)]
struct OsvResponse {
    #[serde(default)]
    affected: Vec<OsvAffected>,
}

#[derive(Debug, Deserialize)]
struct OsvAffected {
    package: Option<OsvPackage>,
    #[serde(default)]
    ranges: Vec<OsvRangeWire>,
}

#[derive(Debug, Deserialize)]
struct OsvPackage {
    ecosystem: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsvRangeWire {
    #[serde(rename = "type")]
    range_type: Option<String>,
    #[serde(default)]
    events: Vec<OsvEventWire>,
}

#[derive(Debug, Default, Deserialize)]
struct OsvEventWire {
    introduced: Option<String>,
    fixed: Option<String>,
    last_affected: Option<String>,
    limit: Option<String>,
}

/// Fetch OSV's affected-package data for a CVE. 404 and any other upstream
/// failure both yield `None` — OSV is a soft signal, same as EPSS. An empty
/// `affected` list also normalizes to `None` rather than an empty `Some(vec![])`.
pub async fn fetch_osv(
    client: &Client,
    policy: &FetchPolicy,
    cve_id: &str,
) -> Option<Vec<OsvAffectedPackage>> {
    let url = format!("{OSV_BASE_URL}/{cve_id}");

    let response = match get_with_retry(client, &url, policy).await {
        Ok(r) if r.status() == StatusCode::NOT_FOUND => return None,
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::warn!(cve_id, status = %r.status(), "OSV returned non-success status");
            return None;
        }
        Err(err) => {
            tracing::warn!(cve_id, error = %err, "OSV fetch failed");
            return None;
        }
    };

    let body: OsvResponse = match response.json().await {
        Ok(b) => b,
        Err(err) => {
            tracing::warn!(cve_id, error = %err, "OSV response failed to decode");
            return None;
        }
    };

    if body.affected.is_empty() {
        return None;
    }

    Some(body.affected.into_iter().map(normalize_affected).collect())
}

fn normalize_affected(affected: OsvAffected) -> OsvAffectedPackage {
    OsvAffectedPackage {
        ecosystem: affected.package.as_ref().and_then(|p| p.ecosystem.clone()),
        package: affected.package.and_then(|p| p.name),
        ranges: affected.ranges.into_iter().map(normalize_range).collect(),
    }
}

fn normalize_range(range: OsvRangeWire) -> OsvRange {
    OsvRange {
        range_type: range.range_type,
        events: range.events.into_iter().map(normalize_event).collect(),
    }
}

fn normalize_event(event: OsvEventWire) -> OsvEvent {
    OsvEvent {
        introduced: event.introduced,
        fixed: event.fixed,
        last_affected: event.last_affected,
        limit: event.limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_last_affected_snake_case_field() {
        let wire = OsvEventWire {
            introduced: None,
            fixed: None,
            last_affected: Some("1.2.3".to_string()),
            limit: None,
        };
        let event = normalize_event(wire);
        assert_eq!(event.last_affected, Some("1.2.3".to_string()));
    }

    #[test]
    fn empty_affected_list_normalizes_to_none() {
        let body = OsvResponse { affected: vec![] };
        assert!(body.affected.is_empty());
    }
}
