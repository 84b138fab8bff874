pub mod client;
pub mod envelope;
pub mod gateway;

pub use client::{ClientMessage, CLIENT_MAX_FRAME_BYTES};
pub use envelope::DispatchEnvelope;
pub use gateway::{GatewayMessage, GATEWAY_MAX_FRAME_BYTES};
