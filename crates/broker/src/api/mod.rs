pub mod agents;
pub mod error;
pub mod rooms;
pub mod settings;
pub mod uploads;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the REST surface: rooms/members/settings/agents, plus the
/// upload-id stub. Standard `{ok, data}` / `{ok: false, error}` envelope
/// on every response.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/rooms", post(rooms::create_room))
        .route("/v1/rooms/:room_id", get(rooms::get_room).put(rooms::update_room))
        .route("/v1/rooms/:room_id/members", post(rooms::add_member))
        .route(
            "/v1/rooms/:room_id/members/:member_id",
            delete(rooms::remove_member),
        )
        .route("/v1/settings/:key", get(settings::get_setting).put(settings::set_setting))
        .route("/v1/agents", get(agents::list_agents))
        .route("/v1/uploads", post(uploads::upload))
        .route("/ws/client", get(crate::hub::client_ws::client_ws))
        .route("/ws/gateway", get(crate::hub::gateway_ws::gateway_ws))
        .route("/ws/admin", get(crate::hub::admin_ws::admin_ws))
}
