//! The `error` module defines the error types returned by the brokers.
//!
//! Structural absence of a listener or topic is an error only for the
//! reply-seeking operations. Fire-and-forget operations report it as `false`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Dispatch attempted while no listener is registered.
    #[error("broker is not listening!")]
    NotListening,

    /// The single listener ran but produced no reply.
    #[error("no reply event returned by listener!")]
    NoReply,

    /// `off` was called with an id that does not own the registration.
    #[error("security error: you are not owner of broker!")]
    Ownership,

    #[error("topic '{0}' is not valid!")]
    InvalidTopic(String),

    #[error("topic '{0}' doesn't exist!")]
    TopicNotFound(String),

    #[error("no valid reply event returned by listeners!")]
    NoValidReply,

    #[error("more than one reply event returned by listeners ({0})!")]
    MultipleReplies(usize),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<tungstenite::Error> for BrokerError {
    fn from(err: tungstenite::Error) -> Self {
        BrokerError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(err: std::io::Error) -> Self {
        BrokerError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
