use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{error, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use super::message::{ClientMessage, ServerMessage};
use super::session::Session;
use crate::config::{BridgeSettings, Settings};
use crate::utils::error::Result;

/// Bind `addr` and run the bridge until the listener fails.
pub async fn start_bridge_server(addr: &str, settings: Settings) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        "WebSocket bridge listening on ws://{}{}",
        addr, settings.server.path
    );
    serve(listener, settings.bridge).await
}

/// Accept connections on an already bound listener.
pub async fn serve(listener: TcpListener, settings: BridgeSettings) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let settings = settings.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, settings).await {
                warn!(%peer, error = %e, "connection closed with error");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, settings: BridgeSettings) -> Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let session_id = format!("session-{}", Uuid::new_v4());
    info!(session = %session_id, "connected");

    // Channel for frames going to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut session = Session::open(&session_id, tx, &settings);
    session.start_traffic(&settings);

    // Forward frames from the session → client
    let writer_id = session_id.clone();
    let writer = spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!(session = %writer_id, error = %e, "failed to serialize frame");
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(WsMessage::text(text)).await {
                warn!(session = %writer_id, error = %e, "failed to send frame");
                break;
            }
        }
    });

    // Handle incoming frames from the client
    while let Some(frame) = ws_receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session = %session_id, error = %e, "read error");
                break;
            }
        };

        match frame {
            WsMessage::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(msg) => {
                    session.handle_client_message(msg).await;
                }
                Err(e) => {
                    warn!(session = %session_id, error = %e, frame = %text.as_str(), "invalid client message");
                }
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    info!(session = %session_id, "disconnected");
    session.close();
    writer.abort();
    Ok(())
}
