//! # secscore_engine
//!
//! The time-aware scoring engine at the center of SecScore: CPE category
//! inference, the Asymmetric Laplace CDF, and signal blending into a final
//! `[0, 10]` score with an ordered explanation.

pub mod cvss;
pub mod scoring;
pub mod types;

pub use cvss::{infer_category, parse_vector, report_confidence, remediation_level, ParsedVector};
pub use scoring::{
    asymmetric_laplace_cdf, build_explanation, compute_secscore, weeks_since, ExplanationContext,
    ScoreInputs, EPSS_BLEND_WEIGHT, KEV_MIN_FLOOR, POC_BONUS_MAX,
};
pub use types::*;

/// Current model version tag, carried on every cached entry and response so
/// stale cache entries can be detected and rewritten on retrieval.
pub const MODEL_VERSION: &str = "1.0.0";
