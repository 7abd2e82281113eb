//! Live session WebSocket endpoint.

pub mod handler;
pub mod messages;

pub use handler::live_handler;
pub use messages::{LiveIncomingMessage, LiveMessageRoute, LiveOutgoingMessage, SessionRequest};
