//! Batch verification route
//!
//! POST /api/verify takes a JSON list of addresses plus an `API-Key` header
//! and returns the verdicts partitioned into `valid` and `invalid` buckets.

use crate::api_handler::{ApiError, ApiResult, VerifyRequest};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use std::sync::Arc;
use tracing::info;
use verifier_core::quota::QuotaError;
use verifier_core::BatchReport;

/// Batch verification endpoint - POST /api/verify
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<BatchReport> {
    let api_key = headers
        .get("API-Key")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::from(QuotaError::UnknownKey))?;

    let Json(request) = body?;
    let batch_size = request.emails.len();

    let report = state.verifier.verify(&request.emails, api_key).await?;

    info!(
        batch_size,
        valid = report.valid.len(),
        invalid = report.invalid.len(),
        "batch verified"
    );
    Ok(Json(report))
}
