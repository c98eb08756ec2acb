//! The `transport` module is the demo bridge: a WebSocket server that gives
//! every connection its own pair of brokers and forwards events between the
//! client and those brokers.
//!
//! It is an external collaborator of the broker family, not part of it. The
//! brokers never touch the network themselves.

pub mod message;
pub mod session;
pub mod websocket;

pub use message::{ClientMessage, DemoEvent, DemoReply, ServerMessage};
pub use session::Session;
pub use websocket::{serve, start_bridge_server};

#[cfg(test)]
mod tests;
