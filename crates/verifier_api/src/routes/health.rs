//! Health check and readiness routes

use crate::AppState;
use axum::{extract::State, response::Json};
use serde::Serialize;
use std::sync::Arc;
use verifier_core::FailureReason;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: std::time::SystemTime,
}

/// Health check endpoint - GET /health
///
/// Simple liveness check. Returns 200 OK with service information.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: std::time::SystemTime::now(),
    })
}

/// Readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: std::time::SystemTime,
}

/// Readiness check endpoint - GET /ready
///
/// Runs a syntactically invalid address through the pipeline. That exercises
/// the full dispatch path but short-circuits before any network stage, so
/// the probe stays cheap and deterministic.
pub async fn ready_handler(State(state): State<Arc<AppState>>) -> Json<ReadinessResponse> {
    let result = state.verifier.pipeline().verify_one("not-an-email").await;
    let ready = result.error_reason == Some(FailureReason::SyntaxInvalid);

    Json(ReadinessResponse {
        ready,
        timestamp: std::time::SystemTime::now(),
    })
}
