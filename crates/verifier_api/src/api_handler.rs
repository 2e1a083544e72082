//! Shared API types and error handling
//!
//! Request/response bodies for the verification endpoints and the mapping
//! from core errors to HTTP status codes.

use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use verifier_core::batch::BatchError;
use verifier_core::quota::QuotaError;

/// Request body for POST /api/verify
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Email addresses to verify, order is preserved in the response
    pub emails: Vec<String>,
}

/// Response body for POST /generate-api-key
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub api_key: String,
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Result type for API handlers
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Missing, unknown or expired API key
    Forbidden(String),
    /// Malformed JSON body or a batch over the size cap
    BadRequest(String),
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Quota(quota) => ApiError::Forbidden(quota.to_string()),
            BatchError::BatchTooLarge { .. } => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<QuotaError> for ApiError {
    fn from(err: QuotaError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
