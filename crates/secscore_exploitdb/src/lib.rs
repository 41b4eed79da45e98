//! # secscore_exploitdb
//!
//! On-demand load of a bundled ExploitDB index and case-insensitive CVE
//! lookup, used by the orchestrator to add a proof-of-concept bonus.

pub mod index;

pub use index::ExploitDbIndex;
