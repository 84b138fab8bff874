pub mod agent;
pub mod chunk;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod message;
pub mod permission;
pub mod room;
pub mod room_context;
pub mod setting;
pub mod trace;

pub use agent::*;
pub use chunk::*;
pub use config::Config;
pub use conversation::*;
pub use error::{Error, Result};
pub use gateway::*;
pub use message::*;
pub use permission::*;
pub use room::*;
pub use room_context::*;
pub use setting::*;
pub use trace::TraceEvent;
