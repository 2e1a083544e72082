//! API key issuance route

use crate::api_handler::ApiKeyResponse;
use crate::AppState;
use axum::{extract::State, response::Json};
use std::sync::Arc;

/// Key issuance endpoint - POST /generate-api-key
///
/// Issues a fresh key with the configured daily quota. Keys are held in
/// memory only and do not survive a restart.
pub async fn generate_key_handler(State(state): State<Arc<AppState>>) -> Json<ApiKeyResponse> {
    Json(ApiKeyResponse {
        api_key: state.quota_store.issue_key(),
    })
}
