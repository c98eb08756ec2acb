//! The broker family.
//!
//! - `sync_broker` / `async_broker`: the single-listener primitive, which turns
//!   one handler into an addressable, revocable listener driven one event at a
//!   time.
//! - `fanout`: many handlers behind one async primitive, replies aggregated.
//! - `topics`: fan-out groups keyed by topic name.
//! - `listener`: ids, handler result types and settled results.

pub mod async_broker;
pub mod fanout;
pub mod listener;
pub mod sync_broker;
pub mod topics;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use async_broker::AsyncEventBroker;
pub use fanout::FanoutBroker;
pub use listener::{
    BaseEvent, BrokerState, HandlerError, HandlerResult, ListenerId, ListenerKind, Settled,
};
pub use sync_broker::EventBroker;
pub use topics::{TopicBroker, is_valid_topic};

/// Lock a broker mutex. Handler panics are caught before they can poison it,
/// so a poisoned guard is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
