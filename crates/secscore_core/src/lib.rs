//! # secscore_core
//!
//! Shared error type and platform path helpers used across the SecScore
//! workspace, split out to avoid circular crate dependencies (mirrors the
//! role `the_foundation` played in the upstream CRYPTEX workspace).

pub mod error;
pub mod platform;

pub use error::{SecScoreError, SecScoreResult};
