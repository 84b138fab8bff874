use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// GET /v1/agents — every agent currently registered by a connected
/// gateway, regardless of which room it's a member of.
pub async fn list_agents(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "ok": true, "data": state.agents.list() }))
}
