pub mod admin_ws;
pub mod client_ws;
pub mod dispatch;
pub mod gateway_ws;
pub mod registry;
