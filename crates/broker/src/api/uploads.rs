use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use uuid::Uuid;

use super::error::ok_json;
use crate::state::AppState;

/// POST /v1/uploads — accepts a raw body and returns an attachment id the
/// caller references in a later `send_message`. Durable file storage is an
/// out-of-scope collaborator; this endpoint only satisfies the id-issuing
/// contract so the rest of the system has something concrete to point at.
pub async fn upload(
    State(_state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let id = Uuid::new_v4().to_string();
    tracing::info!(id = %id, size_bytes = body.len(), content_type = %content_type, "upload accepted (not persisted)");

    ok_json(serde_json::json!({
        "id": id,
        "size_bytes": body.len(),
        "content_type": content_type,
    }))
}
