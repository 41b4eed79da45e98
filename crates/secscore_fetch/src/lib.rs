//! # secscore_fetch
//!
//! HTTP clients for the three upstream signal sources SecScore fans out to
//! per request: NVD (metadata), EPSS (exploitation probability), and OSV
//! (affected packages). Shared timeout/retry/jitter policy lives in
//! [`retry`]; per-source JSON shapes are isolated to their own modules.

pub mod epss;
pub mod nvd;
pub mod osv;
pub mod retry;

pub use retry::{build_client, get_with_retry, FetchPolicy};
