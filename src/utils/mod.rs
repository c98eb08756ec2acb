//! The `utils` module provides shared definitions used across the broker
//! family and the bridge binary.
//!
//! - `error`: the `BrokerError` taxonomy and the crate `Result` alias.
//! - `logging`: `tracing` subscriber initialization.

pub mod error;
pub mod logging;

pub use error::{BrokerError, Result};
