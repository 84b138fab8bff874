use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use agentim_domain::error::Error;

/// Wraps the shared domain error so it can be turned into the REST
/// surface's `{ok: false, error}` envelope without giving `agentim-domain`
/// an axum dependency.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::Limit(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::AgentBusy(_) => StatusCode::CONFLICT,
            Error::AdapterFailure(_) => StatusCode::BAD_GATEWAY,
            Error::PermissionTimeout(_) | Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Io(_) | Error::Json(_) | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = json!({ "ok": false, "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Wrap a successful payload in the `{ok: true, data}` envelope.
pub fn ok_json<T: serde::Serialize>(data: T) -> axum::response::Response {
    Json(json!({ "ok": true, "data": data })).into_response()
}
