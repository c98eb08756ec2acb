//! # event-broker
//!
//! `event_broker` is an in-process publish / request-reply toolkit. A handler
//! is registered as a *listener*, gets an id that only its owner can revoke,
//! and is driven one event at a time. Callers either fire an event or wait
//! for the listener's reply.
//!
//! ## Core Modules
//!
//! - `broker`: the single-listener brokers (sync and async), the fan-out
//!   broker and the topic broker.
//! - `client`: a small WebSocket client for the demo bridge.
//! - `config`: loading and merging the bridge configuration.
//! - `transport`: the demo WebSocket bridge built on top of the brokers.
//! - `utils`: the error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

pub use broker::{
    AsyncEventBroker, EventBroker, FanoutBroker, HandlerResult, ListenerId, TopicBroker,
};
pub use utils::error::{BrokerError, Result};
