//! Shared error type for SecScore components.

use thiserror::Error;

/// All fallible operations across the SecScore crates return this.
///
/// Each variant maps to a spec-defined error category (see the gateway's
/// status-code mapping); no internal error kind leaks past the HTTP boundary.
#[derive(Error, Debug)]
pub enum SecScoreError {
    #[error("invalid CVE identifier: {0}")]
    InvalidIdentifier(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream returned not found")]
    NotFound,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("authorization failed: {0}")]
    Unauthorized(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("unexpected error: {0}")]
    Unknown(String),
}

pub type SecScoreResult<T> = Result<T, SecScoreError>;

impl SecScoreError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn unknown<S: Into<String>>(msg: S) -> Self {
        Self::Unknown(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_formats_message() {
        let err = SecScoreError::config("missing field");
        assert_eq!(err.to_string(), "configuration error: missing field");
    }

    #[test]
    fn not_found_has_stable_message() {
        assert_eq!(
            SecScoreError::NotFound.to_string(),
            "upstream returned not found"
        );
    }
}
