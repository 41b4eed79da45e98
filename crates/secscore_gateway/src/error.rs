//! Sanitized HTTP error envelope. Internal error kinds never leak past this
//! boundary — every variant maps to one of spec.md §7's status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use secscore_core::SecScoreError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    #[serde(rename = "statusCode")]
    status_code: u16,
    message: String,
    #[serde(rename = "requestId")]
    request_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
    request_id: String,
    details: Vec<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, request_id: &str) -> Self {
        Self {
            status,
            message: message.into(),
            request_id: request_id.to_string(),
            details: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>, request_id: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, request_id)
    }

    pub fn unauthorized(message: impl Into<String>, request_id: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, request_id)
    }

    pub fn captcha_failed(error_codes: Vec<String>, request_id: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: "captcha verification failed".to_string(),
            request_id: request_id.to_string(),
            details: error_codes,
        }
    }

    pub fn not_found(request_id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "CVE not found in NVD", request_id)
    }

    pub fn rate_limited(request_id: &str) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded", request_id)
    }

    pub fn from_upstream(err: SecScoreError, request_id: &str) -> Self {
        tracing::error!(error = %err, request_id, "request failed");
        match err {
            SecScoreError::NotFound => Self::not_found(request_id),
            SecScoreError::InvalidIdentifier(msg) => Self::bad_request(msg, request_id),
            SecScoreError::Unauthorized(msg) => Self::unauthorized(msg, request_id),
            SecScoreError::RateLimited => Self::rate_limited(request_id),
            SecScoreError::Upstream(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "upstream request failed", request_id)
            }
            _ => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error",
                request_id,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status_code: self.status.as_u16(),
            message: self.message,
            request_id: self.request_id,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}
