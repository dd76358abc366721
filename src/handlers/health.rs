use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use std::sync::Arc;

use crate::state::AppState;

// health handler
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "startedAt": state.started_at.to_rfc3339(),
        "cachedEntries": state.cached_entries(),
    }))
}
