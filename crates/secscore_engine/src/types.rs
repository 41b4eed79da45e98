//! Core data types for the scoring engine.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Temporal multipliers derived from a CVSS vector's Remediation Level and
/// Report Confidence metrics. `None` means the metric was absent or
/// unrecognized; downstream treats that as a multiplier of 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalMultipliers {
    pub remediation_level: Option<f64>,
    pub report_confidence: Option<f64>,
}

/// Normalized NVD record for a single CVE.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CveMetadata {
    pub cve_id: String,
    pub published_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub cvss_base: Option<f64>,
    pub cvss_vector: Option<String>,
    pub cvss_version: Option<String>,
    pub cpe: BTreeSet<String>,
    pub temporal: TemporalMultipliers,
    pub model_version: String,
}

impl CveMetadata {
    /// A defaulted record for when NVD is unreachable after retries but the
    /// request must still degrade gracefully rather than fail outright.
    pub fn defaulted(cve_id: &str, model_version: &str) -> Self {
        Self {
            cve_id: cve_id.to_string(),
            published_date: None,
            description: None,
            cvss_base: None,
            cvss_vector: None,
            cvss_version: None,
            cpe: BTreeSet::new(),
            temporal: TemporalMultipliers::default(),
            model_version: model_version.to_string(),
        }
    }
}

/// EPSS probability/percentile signal, absent when upstream has no record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpssSignal {
    pub score: f64,
    pub percentile: f64,
    pub fetched_at: DateTime<Utc>,
}

/// A single piece of proof-of-concept exploit evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploitEvidence {
    pub source: String,
    pub url: Option<String>,
    pub published_date: Option<String>,
}

/// One event in an OSV affected-version range (introduced/fixed/etc).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsvEvent {
    pub introduced: Option<String>,
    pub fixed: Option<String>,
    pub last_affected: Option<String>,
    pub limit: Option<String>,
}

/// One affected-version range within an OSV package record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsvRange {
    #[serde(rename = "type")]
    pub range_type: Option<String>,
    pub events: Vec<OsvEvent>,
}

/// One affected-package entry from an OSV record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsvAffectedPackage {
    pub ecosystem: Option<String>,
    pub package: Option<String>,
    pub ranges: Vec<OsvRange>,
}

/// One CISA KEV catalog entry (membership metadata only; the boolean
/// membership flag itself lives on the SecScore response, not here).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KevEntry {
    pub cve_id: String,
    pub date_added: Option<String>,
    pub vendor_project: Option<String>,
    pub product: Option<String>,
}

/// Asymmetric Laplace parameters for one CPE-derived category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub mu: f64,
    pub lambda: f64,
    pub kappa: f64,
}

/// One entry in the ordered, human-readable score explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationEntry {
    pub title: String,
    pub detail: String,
    pub source: String,
}

/// The full SecScore response assembled by the enrichment orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecScoreResponse {
    pub cve_id: String,
    pub published_date: Option<DateTime<Utc>>,
    pub cvss_base: Option<f64>,
    pub cvss_vector: Option<String>,
    pub secscore: f64,
    pub exploit_prob: f64,
    pub model_category: String,
    pub model_params: ModelParams,
    pub epss: Option<EpssSignal>,
    pub exploits: Vec<ExploitEvidence>,
    pub kev: bool,
    pub osv: Option<Vec<OsvAffectedPackage>>,
    pub explanation: Vec<ExplanationEntry>,
    pub computed_at: DateTime<Utc>,
    pub model_version: String,
}

/// The category tags the AL parameter table is keyed by. `inferCategory`
/// never produces anything outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Default,
    Php,
    Webapps,
    Windows,
    Linux,
    Android,
    Ios,
    Macos,
    Java,
    Dos,
    Asp,
    Hardware,
    Remote,
    Local,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Default => "default",
            Category::Php => "php",
            Category::Webapps => "webapps",
            Category::Windows => "windows",
            Category::Linux => "linux",
            Category::Android => "android",
            Category::Ios => "ios",
            Category::Macos => "macos",
            Category::Java => "java",
            Category::Dos => "dos",
            Category::Asp => "asp",
            Category::Hardware => "hardware",
            Category::Remote => "remote",
            Category::Local => "local",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of `computeSecScore`: the final score plus the intermediate
/// values the explanation builder and tests need visibility into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreComputation {
    pub secscore: f64,
    pub temporal_kernel: f64,
    pub exploit_maturity: f64,
    pub e_min: f64,
    pub weeks: f64,
    pub exploit_prob: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaulted_metadata_has_empty_cpe_and_null_fields() {
        let m = CveMetadata::defaulted("CVE-2024-0001", "1.0.0");
        assert!(m.cpe.is_empty());
        assert!(m.cvss_base.is_none());
        assert!(m.published_date.is_none());
    }

    #[test]
    fn category_as_str_round_trips_through_display() {
        assert_eq!(Category::Php.to_string(), "php");
        assert_eq!(Category::Default.as_str(), "default");
    }
}
