//! CVSS vector parsing, temporal multiplier lookup, and CPE category inference.

use std::collections::BTreeMap;

use crate::types::Category;

/// A CVSS vector string split into its declared version and `key:value` pairs.
///
/// Example: `CVSS:3.1/AV:N/AC:L/.../RL:O/RC:C` parses to version `"3.1"` and
/// metrics `{"AV": "N", "AC": "L", ..., "RL": "O", "RC": "C"}`.
#[derive(Debug, Clone, Default)]
pub struct ParsedVector {
    pub version: String,
    pub metrics: BTreeMap<String, String>,
}

/// Parse a CVSS vector string. Returns `None` if the string is empty or the
/// first segment doesn't carry a `CVSS:` prefix.
pub fn parse_vector(vector: &str) -> Option<ParsedVector> {
    let mut segments = vector.split('/');
    let head = segments.next()?;
    let version = head.strip_prefix("CVSS:")?.to_string();
    if version.is_empty() {
        return None;
    }

    let mut metrics = BTreeMap::new();
    for segment in segments {
        if let Some((key, value)) = segment.split_once(':') {
            metrics.insert(key.to_string(), value.to_string());
        }
    }

    Some(ParsedVector { version, metrics })
}

/// Remediation Level multiplier from a vector code or its textual form.
/// Unknown codes return `None`; callers treat that as 1.
pub fn remediation_level(code: &str) -> Option<f64> {
    match code {
        "X" | "NOT_DEFINED" => Some(1.0),
        "U" | "UNAVAILABLE" => Some(1.0),
        "W" | "WORKAROUND" => Some(0.97),
        "T" | "TEMPORARY" => Some(0.96),
        "O" | "OFFICIAL" => Some(0.95),
        "OFFICIAL_FIX" => Some(0.95),
        _ => None,
    }
}

/// Report Confidence multiplier from a vector code or its textual form.
pub fn report_confidence(code: &str) -> Option<f64> {
    match code {
        "X" | "NOT_DEFINED" => Some(1.0),
        "C" | "CONFIRMED" => Some(1.0),
        "R" | "REASONABLE" => Some(0.96),
        "U" | "UNKNOWN" | "UNCONFIRMED" => Some(0.92),
        _ => None,
    }
}

/// Fixed CVSS v4 exploit-maturity constants used only to derive `eMin`.
///
/// These are not read from the vector's `E` metric: the upstream behavior
/// this mirrors uses a fixed ratio of assumed maturity values rather than
/// the v4 specification's actual Exploit Maturity metric, and that quirk is
/// preserved here rather than "fixed".
const CVSS_V4_MATURITY_UNREPORTED: f64 = 0.9;
const CVSS_V4_MATURITY_ATTACKED: f64 = 1.0;

/// `eMin` for a CVSS v4.x record: a fixed ratio, clamped to `[0, 1]`.
pub fn cvss_v4_e_min() -> f64 {
    (CVSS_V4_MATURITY_UNREPORTED / CVSS_V4_MATURITY_ATTACKED).clamp(0.0, 1.0)
}

/// CPE-string category inference. First match wins; the priority order is
/// load-bearing and must not be reordered without a CPE → category
/// regression corpus to back the change.
pub fn infer_category(cpes: &[String]) -> Category {
    if cpes.is_empty() {
        return Category::Default;
    }

    let lowered: Vec<String> = cpes.iter().map(|c| c.to_lowercase()).collect();
    let any = |needles: &[&str]| lowered.iter().any(|c| needles.iter().any(|n| c.contains(n)));

    if any(&["php"]) {
        Category::Php
    } else if any(&["wordpress", "joomla"]) {
        Category::Webapps
    } else if any(&["microsoft", "windows"]) {
        Category::Windows
    } else if any(&["linux", "kernel"]) {
        Category::Linux
    } else if any(&["android", "google:android"]) {
        Category::Android
    } else if any(&["apple:iphone_os", "ios"]) {
        Category::Ios
    } else if any(&["apple:mac_os_x", "macos"]) {
        Category::Macos
    } else if any(&["oracle:java", ":java", "openjdk", "jdk"]) {
        Category::Java
    } else if any(&["denial_of_service", ":dos", "/dos"]) {
        Category::Dos
    } else if any(&["asp.net", "aspnet"]) {
        Category::Asp
    } else if any(&[":h:", "firmware", "hardware"]) {
        Category::Hardware
    } else if any(&["remote"]) {
        Category::Remote
    } else if any(&["local"]) {
        Category::Local
    } else {
        Category::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_version_and_metrics() {
        let parsed = parse_vector("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:C/C:H/I:H/A:H/RL:O/RC:C").unwrap();
        assert_eq!(parsed.version, "3.1");
        assert_eq!(parsed.metrics.get("AV").map(String::as_str), Some("N"));
        assert_eq!(parsed.metrics.get("RL").map(String::as_str), Some("O"));
    }

    #[test]
    fn rejects_vector_without_cvss_prefix() {
        assert!(parse_vector("AV:N/AC:L").is_none());
    }

    #[test]
    fn parses_minimal_v4_vector() {
        let parsed = parse_vector("CVSS:4.0/AV:N").unwrap();
        assert_eq!(parsed.version, "4.0");
        assert_eq!(parsed.metrics.get("AV").map(String::as_str), Some("N"));
    }

    #[test]
    fn remediation_level_accepts_code_and_text() {
        assert_eq!(remediation_level("O"), Some(0.95));
        assert_eq!(remediation_level("OFFICIAL"), Some(0.95));
        assert_eq!(remediation_level("bogus"), None);
    }

    #[test]
    fn report_confidence_accepts_code_and_text() {
        assert_eq!(report_confidence("C"), Some(1.0));
        assert_eq!(report_confidence("U"), Some(0.92));
        assert_eq!(report_confidence("bogus"), None);
    }

    #[test]
    fn v4_e_min_is_fixed_point_nine() {
        assert_eq!(cvss_v4_e_min(), 0.9);
    }

    // S4
    #[test]
    fn infer_category_php_wins_over_windows() {
        let cpes = vec![
            "cpe:/o:microsoft:windows_server:2022".to_string(),
            "cpe:/a:php:php:8.2".to_string(),
        ];
        assert_eq!(infer_category(&cpes), Category::Php);
    }

    #[test]
    fn infer_category_empty_is_default() {
        assert_eq!(infer_category(&[]), Category::Default);
    }

    #[test]
    fn infer_category_is_case_insensitive() {
        let cpes = vec!["CPE:/A:WORDPRESS:WORDPRESS".to_string()];
        assert_eq!(infer_category(&cpes), Category::Webapps);
    }

    #[test]
    fn infer_category_priority_order_hardware_before_remote() {
        let cpes = vec!["cpe:2.3:h:acme:router_firmware:remote_admin".to_string()];
        assert_eq!(infer_category(&cpes), Category::Hardware);
    }
}
