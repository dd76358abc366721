use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::models::RequestKind;
use crate::state::AppState;

// Admin: drop every cached result of one request kind
pub async fn invalidate_kind_handler(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<RequestKind>,
) -> impl IntoResponse {
    state.service.invalidate_kind(kind);
    Json(serde_json::json!({
        "invalidated": kind,
        "cachedEntries": state.cached_entries(),
    }))
}
