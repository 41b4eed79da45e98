//! CVE identifier validation: `^CVE-\d{4}-\d{4,}$`, case-insensitive on input,
//! uppercased on output.

use once_cell::sync::Lazy;
use regex::Regex;

static CVE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^CVE-\d{4}-\d{4,}$").expect("static CVE id pattern is valid"));

/// Validates and normalizes a path-parameter CVE identifier.
///
/// Accepts any case on input (`cve-2021-44228`) and returns the canonical
/// uppercased form; rejects anything that doesn't match the shape after
/// uppercasing.
pub fn normalize_cve_id(raw: &str) -> Option<String> {
    let upper = raw.to_uppercase();
    CVE_ID_PATTERN.is_match(&upper).then_some(upper)
}
