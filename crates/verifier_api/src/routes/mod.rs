//! API Routes Module
//!
//! Endpoint groups:
//! - `verify`: batch email verification
//! - `keys`: API key issuance
//! - `health`: health checks and readiness probes

pub mod health;
pub mod keys;
pub mod verify;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build all API routes and return a configured Router.
pub fn build_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/verify", post(verify::verify_handler))
        .route("/generate-api-key", post(keys::generate_key_handler))
        .route("/health", get(health::health_handler))
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
