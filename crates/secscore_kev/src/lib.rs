//! # secscore_kev
//!
//! The CISA Known Exploited Vulnerabilities catalog: a periodically
//! refreshed, conditionally fetched in-memory index with disk persistence
//! and bootstrap fallback.

pub mod catalog;
pub mod scheduler;

pub use catalog::{CompactFile, KevCatalog, KevEntry, KevSnapshot, RefreshOutcome};
pub use scheduler::KevScheduler;
