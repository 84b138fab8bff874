use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::Value;

use super::error::{ok_json, ApiError};
use crate::state::AppState;

/// GET /v1/settings/:key
pub async fn get_setting(State(state): State<AppState>, Path(key): Path<String>) -> impl IntoResponse {
    match state.settings.get(&key).await {
        Ok(value) => ok_json(value),
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: Value,
}

/// PUT /v1/settings/:key
pub async fn set_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetSettingRequest>,
) -> impl IntoResponse {
    match state.settings.set(&key, req.value).await {
        Ok(()) => ok_json(serde_json::json!({ "key": key })),
        Err(e) => ApiError(e).into_response(),
    }
}
