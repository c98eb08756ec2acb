//! The `client` module is a small bridge client used by the `client`
//! subcommand and for smoke tests: it announces itself, logs the server's
//! events and answers every request.

pub mod bridge_client;
pub use bridge_client::{answer, run_client};

#[cfg(test)]
mod tests;
