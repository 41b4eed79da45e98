//! Bundled ExploitDB index: a one-shot load of a JSON array into a
//! case-insensitive CVE → evidence map, retained for process lifetime.

use std::collections::HashMap;

use secscore_engine::ExploitEvidence;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "cveId")]
    cve_id: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
}

/// Built once at process startup from the bundled JSON file, read-only
/// afterward.
pub struct ExploitDbIndex {
    by_cve: HashMap<String, Vec<ExploitEvidence>>,
}

impl ExploitDbIndex {
    /// Parse the bundled JSON array. A read/parse failure logs once and
    /// yields an empty index rather than propagating an error — a missing
    /// PoC index should never take the service down.
    pub fn load(bundled_json: &str) -> Self {
        let raw: Vec<RawEntry> = match serde_json::from_str(bundled_json) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(error = %err, "failed to parse bundled ExploitDB index; using empty index");
                Vec::new()
            }
        };

        let mut by_cve: HashMap<String, Vec<ExploitEvidence>> = HashMap::new();
        for entry in raw {
            let Some(cve_id) = entry.cve_id.filter(|s| !s.is_empty()) else {
                continue;
            };
            by_cve
                .entry(cve_id.to_uppercase())
                .or_default()
                .push(ExploitEvidence {
                    source: "exploitdb".to_string(),
                    url: entry.url,
                    published_date: entry.published_date,
                });
        }

        Self { by_cve }
    }

    /// Case-insensitive lookup; always returns (possibly empty) evidence.
    pub fn lookup(&self, cve_id: &str) -> Vec<ExploitEvidence> {
        self.by_cve
            .get(&cve_id.to_uppercase())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"cveId": "CVE-2021-44228", "url": "https://example.com/1", "publishedDate": "2021-12-10"},
        {"cveId": "cve-2021-44228", "url": "https://example.com/2", "publishedDate": "2021-12-11"},
        {"url": "https://example.com/no-cve"},
        {"cveId": "CVE-2022-0001"}
    ]"#;

    #[test]
    fn lookup_is_case_insensitive() {
        let index = ExploitDbIndex::load(SAMPLE);
        let lower = index.lookup("cve-2021-44228");
        let upper = index.lookup("CVE-2021-44228");
        assert_eq!(lower.len(), 2);
        assert_eq!(upper.len(), 2);
    }

    #[test]
    fn entries_without_a_cve_id_are_filtered() {
        let index = ExploitDbIndex::load(SAMPLE);
        assert!(index.lookup("").is_empty());
    }

    #[test]
    fn missing_cve_returns_empty_vec() {
        let index = ExploitDbIndex::load(SAMPLE);
        assert!(index.lookup("CVE-2099-9999").is_empty());
    }

    #[test]
    fn malformed_json_yields_empty_index_not_a_panic() {
        let index = ExploitDbIndex::load("not json");
        assert!(index.lookup("CVE-2021-44228").is_empty());
    }

    #[test]
    fn entry_with_only_required_field_still_indexes() {
        let index = ExploitDbIndex::load(SAMPLE);
        let entries = index.lookup("CVE-2022-0001");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, None);
    }
}
