//! Synchronous single-listener broker
//!
//! `EventBroker` owns at most one handler. The handler runs on a dedicated
//! listener thread and is fed one event at a time through a zero-capacity
//! `sync_channel`, so every `emit` is a rendezvous: the caller blocks until the
//! handler has taken the event and handed back its (optional) reply.
//!
//! Usage notes:
//! - A second registration while listening is rejected (`None`), never replaced.
//! - `off` with a foreign `ListenerId` is an `Ownership` error; `off` on an idle
//!   broker is a plain `Ok(false)`.
//! - Callers serialize `emit*` calls. Emitting from inside the broker's own
//!   handler would wait on itself forever.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, Weak};
use std::thread;

use tracing::{debug, error, warn};

use super::listener::{
    BrokerState, HandlerResult, ListenerId, ListenerKind, panic_message,
};
use super::lock;
use crate::utils::error::{BrokerError, Result};

struct Turn<E, R> {
    event: E,
    reply: SyncSender<Option<R>>,
}

struct Registration<E, R> {
    id: ListenerId,
    kind: ListenerKind,
    sender: SyncSender<Turn<E, R>>,
}

type Slot<E, R> = Mutex<Option<Registration<E, R>>>;

pub struct EventBroker<E, R = E> {
    slot: Arc<Slot<E, R>>,
}

impl<E, R> EventBroker<E, R>
where
    E: Send + 'static,
    R: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a persistent handler.
    ///
    /// Returns `None` when a listener is already registered, and also when
    /// the listener thread cannot be spawned (logged at `error`). Check
    /// `is_on()` to tell the two apart: it stays `false` in the second case.
    pub fn on<F>(&self, handler: F) -> Option<ListenerId>
    where
        F: FnMut(E) -> HandlerResult<R> + Send + 'static,
    {
        self.register(ListenerKind::On, handler)
    }

    /// Register a handler for a single event; the broker goes back to idle
    /// as soon as that event has been handled.
    pub fn once<F>(&self, handler: F) -> Option<ListenerId>
    where
        F: FnMut(E) -> HandlerResult<R> + Send + 'static,
    {
        self.register(ListenerKind::Once, handler)
    }

    fn register<F>(&self, kind: ListenerKind, handler: F) -> Option<ListenerId>
    where
        F: FnMut(E) -> HandlerResult<R> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if slot.is_some() {
            return None;
        }

        let id = ListenerId::generate();
        let (sender, turns) = mpsc::sync_channel(0);
        let owner = Arc::downgrade(&self.slot);
        let listener_id = id.clone();

        let spawned = thread::Builder::new()
            .name(format!("listener-{kind}"))
            .spawn(move || listen(listener_id, kind, handler, turns, owner));
        if let Err(e) = spawned {
            error!(listener = %id, error = %e, "failed to spawn listener thread");
            return None;
        }

        *slot = Some(Registration {
            id: id.clone(),
            kind,
            sender,
        });
        Some(id)
    }

    /// Unregister the listener owning `id`.
    pub fn off(&self, id: &ListenerId) -> Result<bool> {
        let mut slot = lock(&self.slot);
        match slot.as_ref() {
            None => Ok(false),
            Some(registration) if registration.id != *id => Err(BrokerError::Ownership),
            Some(registration) => {
                debug!(listener = %id, kind = %registration.kind, "unregistering listener");
                // dropping the sender ends the listener loop
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

    /// Hand `event` to the listener. Returns `false` (event dropped) when idle.
    pub fn emit(&self, event: E) -> bool {
        self.dispatch(event).is_some()
    }

    /// Hand `event` to the listener and return its reply.
    pub fn emit_with_reply(&self, event: E) -> Result<R> {
        match self.dispatch(event) {
            None => Err(BrokerError::NotListening),
            Some(None) => Err(BrokerError::NoReply),
            Some(Some(reply)) => Ok(reply),
        }
    }

    /// `None` when nobody took the event, otherwise the handler's outcome.
    fn dispatch(&self, event: E) -> Option<Option<R>> {
        let sender = lock(&self.slot).as_ref().map(|r| r.sender.clone())?;
        let (reply, outcome) = mpsc::sync_channel(1);
        sender.send(Turn { event, reply }).ok()?;
        outcome.recv().ok()
    }

    #[deprecated(note = "use `on`")]
    pub fn start<F>(&self, handler: F) -> Option<ListenerId>
    where
        F: FnMut(E) -> HandlerResult<R> + Send + 'static,
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
    pub fn send(&self, event: E) -> bool {
        self.emit(event)
    }

    #[deprecated(note = "use `emit_with_reply`")]
    pub fn send_and_wait_for_reply(&self, event: E) -> Result<R> {
        self.emit_with_reply(event)
    }
}

impl<E, R> Default for EventBroker<E, R>
where
    E: Send + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, R> std::fmt::Debug for EventBroker<E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = lock(&self.slot);
        f.debug_struct("EventBroker")
            .field("listener", &slot.as_ref().map(|r| r.id.as_str()))
            .finish()
    }
}

fn listen<E, R, F>(
    id: ListenerId,
    kind: ListenerKind,
    mut handler: F,
    turns: Receiver<Turn<E, R>>,
    owner: Weak<Slot<E, R>>,
) where
    F: FnMut(E) -> HandlerResult<R>,
{
    debug!(listener = %id, %kind, "start listening");

    while let Ok(Turn { event, reply }) = turns.recv() {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
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

    debug!(listener = %id, %kind, "stop listening");
}

/// Clear the slot if it still belongs to `id`.
fn release<E, R>(owner: &Weak<Slot<E, R>>, id: &ListenerId) {
    if let Some(slot) = owner.upgrade() {
        let mut slot = lock(&slot);
        if slot.as_ref().is_some_and(|r| r.id == *id) {
            *slot = None;
        }
    }
}
