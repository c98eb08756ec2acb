//! Bridge wire protocol.
//!
//! Every frame is a JSON object tagged by `type`. Replies are correlated with
//! requests through the `id` the server puts on each `request`.

use serde::{Deserialize, Serialize};

/// Event carried by the bridge brokers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoEvent {
    pub data: String,
    #[serde(default)]
    pub reply: bool,
}

impl DemoEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            reply: false,
        }
    }

    /// An event that asks its listener for a reply.
    pub fn request(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            reply: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoReply {
    pub data: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "event")]
    Event { data: String, reply: Option<bool> },
    #[serde(rename = "reply")]
    Reply { id: String, data: String },
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "event")]
    Event { data: String },
    #[serde(rename = "request")]
    Request { id: String, data: String },
}
