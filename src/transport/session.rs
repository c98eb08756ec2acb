//! Per-connection broker pair.
//!
//! A `Session` owns two brokers:
//! - `local`: a sync `EventBroker` that handles events arriving from the client.
//! - `remote`: an `AsyncEventBroker` whose handler forwards events to the
//!   client. Reply-seeking events go out as `request` frames and the handler
//!   waits (bounded by `reply_timeout_ms`) for the matching `reply`.
//!
//! Closing the session aborts its timers, unregisters both listeners with the
//! ids they were registered under and fails any request still waiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::message::{ClientMessage, DemoEvent, DemoReply, ServerMessage};
use crate::broker::{AsyncEventBroker, EventBroker, HandlerResult, ListenerId, lock};
use crate::config::BridgeSettings;

type PendingReplies = Arc<Mutex<HashMap<String, oneshot::Sender<DemoReply>>>>;

pub struct Session {
    id: String,
    local: Arc<EventBroker<DemoEvent, DemoReply>>,
    remote: Arc<AsyncEventBroker<DemoEvent, DemoReply>>,
    local_id: Option<ListenerId>,
    remote_id: Option<ListenerId>,
    pending: PendingReplies,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Create the broker pair and register both listeners.
    ///
    /// Frames for the client are pushed onto `outbound`.
    pub fn open(
        id: &str,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        settings: &BridgeSettings,
    ) -> Self {
        let local = Arc::new(EventBroker::new());
        let remote = Arc::new(AsyncEventBroker::new());
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));

        let session_id = id.to_string();
        let local_id = local.on(move |event: DemoEvent| {
            info!(session = %session_id, data = %event.data, "message from client");
            Ok(None)
        });

        let timeout = Duration::from_millis(settings.reply_timeout_ms);
        let forward_pending = Arc::clone(&pending);
        let remote_id = remote.on(move |event: DemoEvent| {
            forward(
                event,
                outbound.clone(),
                Arc::clone(&forward_pending),
                timeout,
            )
        });

        debug!(session = id, "session opened");
        Self {
            id: id.to_string(),
            local,
            remote,
            local_id,
            remote_id,
            pending,
            tasks: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn local(&self) -> Arc<EventBroker<DemoEvent, DemoReply>> {
        Arc::clone(&self.local)
    }

    pub fn remote(&self) -> Arc<AsyncEventBroker<DemoEvent, DemoReply>> {
        Arc::clone(&self.remote)
    }

    /// Start the demo traffic: a `ping<N>` event every `ping_interval_ms` and
    /// one `how are you?` request after `request_delay_ms`.
    pub fn start_traffic(&mut self, settings: &BridgeSettings) {
        let remote = self.remote();
        let interval = Duration::from_millis(settings.ping_interval_ms);
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            let mut tick: u64 = 0;
            loop {
                ticker.tick().await;
                remote.emit(DemoEvent::new(format!("ping{tick}"))).await;
                tick += 1;
            }
        }));

        let remote = self.remote();
        let session = self.id.clone();
        let delay = Duration::from_millis(settings.request_delay_ms);
        self.tasks.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!(session = %session, "emitting and waiting for reply");
            match remote.emit_with_reply(DemoEvent::request("how are you?")).await {
                Ok(reply) => info!(session = %session, reply = %reply.data, "reply received"),
                Err(e) => warn!(session = %session, error = %e, "request got no reply"),
            }
        }));
    }

    /// Route one inbound frame. Returns whether it reached its target.
    pub async fn handle_client_message(&self, msg: ClientMessage) -> bool {
        match msg {
            ClientMessage::Event { data, reply } => {
                let event = DemoEvent {
                    data,
                    reply: reply.unwrap_or(false),
                };
                let local = self.local();
                // the sync broker blocks until its listener thread is done
                tokio::task::spawn_blocking(move || local.emit(event))
                    .await
                    .unwrap_or(false)
            }
            ClientMessage::Reply { id, data } => {
                let waiting = lock(&self.pending).remove(&id);
                match waiting {
                    Some(sender) => sender.send(DemoReply { data }).is_ok(),
                    None => {
                        warn!(session = %self.id, request = %id, "reply for unknown request");
                        false
                    }
                }
            }
        }
    }

    /// Tear the session down.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        // waiting handlers observe the dropped senders
        lock(&self.pending).clear();

        if let Some(id) = self.local_id.take() {
            if let Err(e) = self.local.off(&id) {
                warn!(session = %self.id, error = %e, "failed to stop local broker");
            }
        }
        if let Some(id) = self.remote_id.take() {
            if let Err(e) = self.remote.off(&id) {
                warn!(session = %self.id, error = %e, "failed to stop remote broker");
            }
        }
        debug!(session = %self.id, "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.local_id.is_some() || self.remote_id.is_some() {
            self.shutdown();
        }
    }
}

async fn forward(
    event: DemoEvent,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    pending: PendingReplies,
    timeout: Duration,
) -> HandlerResult<DemoReply> {
    if !event.reply {
        outbound.send(ServerMessage::Event { data: event.data })?;
        return Ok(None);
    }

    let id = Uuid::new_v4().to_string();
    let (sender, reply) = oneshot::channel();
    lock(&pending).insert(id.clone(), sender);

    let request = ServerMessage::Request {
        id: id.clone(),
        data: event.data,
    };
    if let Err(e) = outbound.send(request) {
        lock(&pending).remove(&id);
        return Err(e.into());
    }

    match tokio::time::timeout(timeout, reply).await {
        Ok(Ok(reply)) => Ok(Some(reply)),
        Ok(Err(_)) => Err(format!("session closed before request {id} was answered").into()),
        Err(_) => {
            lock(&pending).remove(&id);
            Err(format!("no reply to request {id} within {timeout:?}").into())
        }
    }
}
