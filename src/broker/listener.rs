//! Listener identity and handler types shared by every broker variant.
//!
//! A `ListenerId` is the capability handed out on registration. The broker
//! that minted it is the only one that can validate it, and presenting it to
//! `off` is the only way to revoke the registration.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The open-ended event shape: field name to JSON value.
pub type BaseEvent = serde_json::Map<String, serde_json::Value>;

/// Error raised by a handler. It never reaches the emitting caller.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler produces for one event: a reply, nothing, or a failure.
pub type HandlerResult<R> = Result<Option<R>, HandlerError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(String);

impl ListenerId {
    /// Mint a fresh id from a v4 UUID and the current timestamp.
    pub fn generate() -> Self {
        Self(format!(
            "el_{}@{}",
            Uuid::new_v4().simple(),
            Utc::now().timestamp_millis()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ListenerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ListenerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Persistent (`On`) or one-shot (`Once`) registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    On,
    Once,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::On => f.write_str("on"),
            ListenerKind::Once => f.write_str("once"),
        }
    }
}

/// Externally observable state of a single-listener broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Idle,
    Listening,
}

/// Outcome of one handler invocation during a fan-out dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<R> {
    /// The handler completed, with or without a reply.
    Fulfilled(Option<R>),
    /// The handler returned an error or panicked.
    Rejected(String),
}

impl<R> Settled<R> {
    /// The reply carried by a fulfilled result, if any.
    pub fn into_reply(self) -> Option<R> {
        match self {
            Settled::Fulfilled(reply) => reply,
            Settled::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Settled::Rejected(_))
    }
}

/// Render a caught panic payload for logging.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "handler panicked".to_string()
    }
}
