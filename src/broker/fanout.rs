//! Fan-out broker
//!
//! `FanoutBroker` makes the single-listener primitive look like a broker with
//! many independent handlers. It keeps a `ListenerMap` of async handlers and
//! registers one internal dispatch function on an [`AsyncEventBroker`] used as
//! transport. Each dispatched event is cloned to every handler registered at
//! that moment; the handlers run concurrently and every invocation is settled
//! on its own, so one failing handler never hides the others' replies.
//!
//! The transport listener exists iff the map is non-empty: it is registered by
//! the first `on` and torn down by the `off` that empties the map. Both happen
//! under the same lock as the map update.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, error, warn};

use super::async_broker::AsyncEventBroker;
use super::listener::{HandlerResult, ListenerId, Settled, panic_message};
use super::lock;
use crate::utils::error::{BrokerError, Result};

type AsyncHandler<E, R> = Arc<dyn Fn(E) -> BoxFuture<'static, HandlerResult<R>> + Send + Sync>;

/// Registered handlers in registration order.
struct ListenerMap<E, R> {
    entries: Vec<(ListenerId, AsyncHandler<E, R>)>,
}

impl<E, R> ListenerMap<E, R> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, id: ListenerId, handler: AsyncHandler<E, R>) {
        self.entries.push((id, handler));
    }

    fn remove(&mut self, id: &ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(key, _)| key != id);
        self.entries.len() != before
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn snapshot(&self) -> Vec<(ListenerId, AsyncHandler<E, R>)> {
        self.entries.clone()
    }
}

/// Listener map and transport registration, guarded together so that
/// registering, removing and starting or stopping the transport is one step.
struct FanoutState<E, R> {
    listeners: ListenerMap<E, R>,
    transport_id: Option<ListenerId>,
}

pub struct FanoutBroker<E, R = E> {
    state: Arc<Mutex<FanoutState<E, R>>>,
    transport: AsyncEventBroker<E, Vec<Settled<R>>>,
}

impl<E, R> FanoutBroker<E, R>
where
    E: Clone + Send + 'static,
    R: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FanoutState {
                listeners: ListenerMap::new(),
                transport_id: None,
            })),
            transport: AsyncEventBroker::new(),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    /// Add a handler and return its id.
    ///
    /// Outside a tokio runtime the transport cannot be started: the failure
    /// is logged and the returned id is never registered.
    pub fn on<F, Fut>(&self, handler: F) -> ListenerId
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<R>> + Send + 'static,
    {
        let id = ListenerId::generate();
        let handler: AsyncHandler<E, R> = Arc::new(move |event| handler(event).boxed());

        let mut state = lock(&self.state);
        if state.transport_id.is_none() {
            state.transport_id = self.start_transport();
            if state.transport_id.is_none() {
                error!(listener = %id, "fan-out transport could not start, handler dropped");
                return id;
            }
        }
        state.listeners.insert(id.clone(), handler);
        id
    }

    /// Remove a handler. Returns whether `id` was registered.
    pub fn off(&self, id: &ListenerId) -> bool {
        let mut state = lock(&self.state);
        let removed = state.listeners.remove(id);
        if state.listeners.is_empty() {
            if let Some(transport_id) = state.transport_id.take() {
                self.stop_transport(&transport_id);
            }
        }
        removed
    }

    /// Broadcast `event`. `false` when there is no handler to take it.
    pub async fn emit(&self, event: E) -> bool {
        if self.listener_count() == 0 {
            return false;
        }
        self.transport.emit(event).await
    }

    /// Broadcast `event` and require exactly one handler to reply.
    pub async fn emit_with_reply(&self, event: E) -> Result<R> {
        let mut replies = self.emit_with_replies(event).await?;
        if replies.len() > 1 {
            return Err(BrokerError::MultipleReplies(replies.len()));
        }
        replies.pop().ok_or(BrokerError::NoValidReply)
    }

    /// Broadcast `event` and collect every reply, in registration order.
    ///
    /// Handlers that failed or produced nothing are skipped.
    pub async fn emit_with_replies(&self, event: E) -> Result<Vec<R>> {
        let settled = match self.transport.emit_with_reply(event).await {
            Ok(settled) => settled,
            // the map emptied between registration check and dispatch
            Err(BrokerError::NoReply) => return Err(BrokerError::NoValidReply),
            Err(e) => return Err(e),
        };

        let replies: Vec<R> = settled
            .into_iter()
            .filter_map(Settled::into_reply)
            .collect();
        if replies.is_empty() {
            return Err(BrokerError::NoValidReply);
        }
        Ok(replies)
    }

    // Called with the state lock held; the transport only locks its own slot.
    fn start_transport(&self) -> Option<ListenerId> {
        let state = Arc::downgrade(&self.state);
        let transport_id = self.transport.on(move |event: E| {
            let handlers = match state.upgrade() {
                Some(state) => lock(&state).listeners.snapshot(),
                None => Vec::new(),
            };
            settle_all(handlers, event)
        })?;
        debug!(transport = %transport_id, "fan-out transport started");
        Some(transport_id)
    }

    fn stop_transport(&self, transport_id: &ListenerId) {
        match self.transport.off(transport_id) {
            Ok(_) => debug!(transport = %transport_id, "fan-out transport stopped"),
            Err(e) => warn!(transport = %transport_id, error = %e, "failed to stop fan-out transport"),
        }
    }
}

impl<E, R> Default for FanoutBroker<E, R>
where
    E: Clone + Send + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, R> std::fmt::Debug for FanoutBroker<E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutBroker")
            .field("listener_count", &lock(&self.state).listeners.len())
            .field("transport", &self.transport)
            .finish()
    }
}

/// Run every handler of the snapshot concurrently and settle each result.
async fn settle_all<E, R>(
    handlers: Vec<(ListenerId, AsyncHandler<E, R>)>,
    event: E,
) -> HandlerResult<Vec<Settled<R>>>
where
    E: Clone + Send + 'static,
    R: Send + 'static,
{
    if handlers.is_empty() {
        return Ok(None);
    }

    let invocations: Vec<_> = handlers
        .into_iter()
        .map(|(id, handler)| {
            let event = event.clone();
            async move {
                let turn = AssertUnwindSafe(async move { handler(event).await });
                match turn.catch_unwind().await {
                    Ok(Ok(reply)) => Settled::Fulfilled(reply),
                    Ok(Err(e)) => {
                        warn!(listener = %id, error = %e, "error evaluating handler");
                        Settled::Rejected(e.to_string())
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        warn!(listener = %id, panic = %message, "handler panicked");
                        Settled::Rejected(message)
                    }
                }
            }
        })
        .collect();

    Ok(Some(join_all(invocations).await))
}
