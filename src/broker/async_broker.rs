//! Asynchronous single-listener broker
//!
//! Same contract as [`EventBroker`](super::EventBroker), but the handler is an
//! async function driven by a spawned tokio task. Each `emit` sends the event
//! with a `oneshot` reply slot and awaits it, so exactly one handler
//! resumption is in flight per call.
//!
//! `on`, `once` and `off` are synchronous but `on`/`once` spawn the listener
//! task on the current tokio runtime. Called outside one, they log an error
//! and return `None`, leaving the broker idle.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, Weak};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use super::listener::{
    BrokerState, HandlerResult, ListenerId, ListenerKind, panic_message,
};
use super::lock;
use crate::utils::error::{BrokerError, Result};

struct Turn<E, R> {
    event: E,
    reply: oneshot::Sender<Option<R>>,
}

struct Registration<E, R> {
    id: ListenerId,
    kind: ListenerKind,
    sender: mpsc::Sender<Turn<E, R>>,
}

type Slot<E, R> = Mutex<Option<Registration<E, R>>>;

pub struct AsyncEventBroker<E, R = E> {
    slot: Arc<Slot<E, R>>,
}

impl<E, R> AsyncEventBroker<E, R>
where
    E: Send + 'static,
    R: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a persistent async handler.
    ///
    /// `None` if already listening or if there is no tokio runtime to drive
    /// the handler.
    pub fn on<F, Fut>(&self, handler: F) -> Option<ListenerId>
    where
        F: FnMut(E) -> Fut + Send + 'static,
        Fut: Future<Output = HandlerResult<R>> + Send + 'static,
    {
        self.register(ListenerKind::On, handler)
    }

    /// Register an async handler for a single event.
    pub fn once<F, Fut>(&self, handler: F) -> Option<ListenerId>
    where
        F: FnMut(E) -> Fut + Send + 'static,
        Fut: Future<Output = HandlerResult<R>> + Send + 'static,
    {
        self.register(ListenerKind::Once, handler)
    }

    fn register<F, Fut>(&self, kind: ListenerKind, handler: F) -> Option<ListenerId>
    where
        F: FnMut(E) -> Fut + Send + 'static,
        Fut: Future<Output = HandlerResult<R>> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if slot.is_some() {
            return None;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(%kind, error = %e, "no tokio runtime to drive the listener");
                return None;
            }
        };

        let id = ListenerId::generate();
        let (sender, turns) = mpsc::channel(1);
        runtime.spawn(listen(
            id.clone(),
            kind,
            handler,
            turns,
            Arc::downgrade(&self.slot),
        ));

        *slot = Some(Registration {
            id: id.clone(),
            kind,
            sender,
        });
        Some(id)
    }

    /// Unregister the listener owning `id`.
    ///
    /// `Ok(false)` when idle, `Err(Ownership)` when `id` is not the owner.
    pub fn off(&self, id: &ListenerId) -> Result<bool> {
        let mut slot = lock(&self.slot);
        match slot.as_ref() {
            None => Ok(false),
            Some(registration) if registration.id != *id => Err(BrokerError::Ownership),
            Some(registration) => {
                debug!(listener = %id, kind = %registration.kind, "unregistering listener");
                *slot = None;
                Ok(true)
            }
        }
    }

    pub fn is_on(&self) -> bool {
        lock(&self.slot).is_some()
    }

    pub fn state(&self) -> BrokerState {
        if self.is_on() {
            BrokerState::Listening
        } else {
            BrokerState::Idle
        }
    }

    pub async fn emit(&self, event: E) -> bool {
        self.dispatch(event).await.is_some()
    }

    pub async fn emit_with_reply(&self, event: E) -> Result<R> {
        match self.dispatch(event).await {
            None => Err(BrokerError::NotListening),
            Some(None) => Err(BrokerError::NoReply),
            Some(Some(reply)) => Ok(reply),
        }
    }

    async fn dispatch(&self, event: E) -> Option<Option<R>> {
        let sender = lock(&self.slot).as_ref().map(|r| r.sender.clone())?;
        let (reply, outcome) = oneshot::channel();
        sender.send(Turn { event, reply }).await.ok()?;
        outcome.await.ok()
    }

    #[deprecated(note = "use `on`")]
    pub fn start<F, Fut>(&self, handler: F) -> Option<ListenerId>
    where
        F: FnMut(E) -> Fut + Send + 'static,
        Fut: Future<Output = HandlerResult<R>> + Send + 'static,
    {
        self.on(handler)
    }

    #[deprecated(note = "use `off`")]
    pub fn stop(&self, id: &ListenerId) -> Result<bool> {
        self.off(id)
    }

    #[deprecated(note = "use `is_on`")]
    pub fn is_started(&self) -> bool {
        self.is_on()
    }

    #[deprecated(note = "use `emit`")]
    pub async fn send(&self, event: E) -> bool {
        self.emit(event).await
    }

    #[deprecated(note = "use `emit_with_reply`")]
    pub async fn send_and_wait_for_reply(&self, event: E) -> Result<R> {
        self.emit_with_reply(event).await
    }
}

impl<E, R> Default for AsyncEventBroker<E, R>
where
    E: Send + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, R> std::fmt::Debug for AsyncEventBroker<E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = lock(&self.slot);
        f.debug_struct("AsyncEventBroker")
            .field("listener", &slot.as_ref().map(|r| r.id.as_str()))
            .finish()
    }
}

async fn listen<E, R, F, Fut>(
    id: ListenerId,
    kind: ListenerKind,
    mut handler: F,
    mut turns: mpsc::Receiver<Turn<E, R>>,
    owner: Weak<Slot<E, R>>,
) where
    F: FnMut(E) -> Fut,
    Fut: Future<Output = HandlerResult<R>>,
{
    debug!(listener = %id, %kind, "async start listening");

    while let Some(Turn { event, reply }) = turns.recv().await {
        let turn = AssertUnwindSafe(async { handler(event).await });
        let outcome = match turn.catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(listener = %id, error = %e, "error evaluating handler");
                None
            }
            Err(payload) => {
                warn!(listener = %id, panic = %panic_message(payload.as_ref()), "handler panicked");
                None
            }
        };

        if kind == ListenerKind::Once {
            release(&owner, &id);
            let _ = reply.send(outcome);
            break;
        }
        let _ = reply.send(outcome);
    }

    debug!(listener = %id, %kind, "async stop listening");
}

fn release<E, R>(owner: &Weak<Slot<E, R>>, id: &ListenerId) {
    if let Some(slot) = owner.upgrade() {
        let mut slot = lock(&slot);
        if slot.as_ref().is_some_and(|r| r.id == *id) {
            *slot = None;
        }
    }
}
