//! Topic management
//!
//! `TopicBroker` namespaces fan-out groups by topic name. A `FanoutBroker` is
//! created the first time a handler registers on a topic and stays resident
//! afterwards, even once its last listener is gone.
//!
//! Unknown topics degrade to `false` for `off`/`emit` but are a
//! `TopicNotFound` error for the reply-seeking operations.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::fanout::FanoutBroker;
use super::listener::{HandlerResult, ListenerId};
use super::lock;
use crate::utils::error::{BrokerError, Result};

/// A topic must contain at least one ASCII word character (`[A-Za-z0-9_]`).
///
/// `user-events` and `a.b` are valid; `""`, `*` and `é` are not.
pub fn is_valid_topic(topic: &str) -> bool {
    topic.chars().any(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub struct TopicBroker<E, R = E> {
    topics: Mutex<BTreeMap<String, Arc<FanoutBroker<E, R>>>>,
}

impl<E, R> TopicBroker<E, R>
where
    E: Clone + Send + 'static,
    R: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(BTreeMap::new()),
        }
    }

    /// Snapshot of the known topic names, sorted.
    pub fn topic_names(&self) -> Vec<String> {
        lock(&self.topics).keys().cloned().collect()
    }

    /// Listener count of one topic, or of all topics when `topic` is `None`.
    pub fn listener_count(&self, topic: Option<&str>) -> usize {
        let topics = lock(&self.topics);
        match topic {
            Some(name) => topics.get(name).map_or(0, |b| b.listener_count()),
            None => topics.values().map(|b| b.listener_count()).sum(),
        }
    }

    pub fn on<F, Fut>(&self, topic: &str, handler: F) -> Result<ListenerId>
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<R>> + Send + 'static,
    {
        if !is_valid_topic(topic) {
            return Err(BrokerError::InvalidTopic(topic.to_string()));
        }

        let broker = {
            let mut topics = lock(&self.topics);
            Arc::clone(topics.entry(topic.to_string()).or_insert_with(|| {
                debug!(topic, "creating topic");
                Arc::new(FanoutBroker::new())
            }))
        };
        Ok(broker.on(handler))
    }

    pub fn off(&self, topic: &str, id: &ListenerId) -> bool {
        self.broker(topic).is_some_and(|b| b.off(id))
    }

    pub async fn emit(&self, topic: &str, event: E) -> bool {
        match self.broker(topic) {
            Some(broker) => broker.emit(event).await,
            None => false,
        }
    }

    pub async fn emit_with_reply(&self, topic: &str, event: E) -> Result<R> {
        self.existing(topic)?.emit_with_reply(event).await
    }

    pub async fn emit_with_replies(&self, topic: &str, event: E) -> Result<Vec<R>> {
        self.existing(topic)?.emit_with_replies(event).await
    }

    fn broker(&self, topic: &str) -> Option<Arc<FanoutBroker<E, R>>> {
        lock(&self.topics).get(topic).cloned()
    }

    fn existing(&self, topic: &str) -> Result<Arc<FanoutBroker<E, R>>> {
        self.broker(topic)
            .ok_or_else(|| BrokerError::TopicNotFound(topic.to_string()))
    }
}

impl<E, R> Default for TopicBroker<E, R>
where
    E: Clone + Send + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, R> std::fmt::Debug for TopicBroker<E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicBroker")
            .field("topics", &lock(&self.topics).keys().collect::<Vec<_>>())
            .finish()
    }
}
