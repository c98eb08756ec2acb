use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::transport::{ClientMessage, ServerMessage};
use crate::utils::error::{BrokerError, Result};

/// The reply the demo client gives to any request.
pub const DEFAULT_ANSWER: &str = "fine, thanks";

/// Frame to send back for `msg`, if it needs one.
pub fn answer(msg: &ServerMessage) -> Option<ClientMessage> {
    match msg {
        ServerMessage::Event { .. } => None,
        ServerMessage::Request { id, .. } => Some(ClientMessage::Reply {
            id: id.clone(),
            data: DEFAULT_ANSWER.to_string(),
        }),
    }
}

fn encode(msg: &ClientMessage) -> Result<WsMessage> {
    let json = serde_json::to_string(msg).map_err(|e| BrokerError::Transport(e.to_string()))?;
    Ok(WsMessage::text(json))
}

/// Connect to `url`, send `greeting` and serve the connection until the
/// server closes it or `max_requests` requests have been answered.
pub async fn run_client(url: &str, greeting: &str, max_requests: Option<usize>) -> Result<()> {
    let (mut ws_stream, _response) = connect_async(url).await?;
    info!(%url, "connected to bridge");

    let hello = ClientMessage::Event {
        data: greeting.to_string(),
        reply: None,
    };
    ws_stream.send(encode(&hello)?).await?;

    let mut answered = 0;
    while let Some(frame) = ws_stream.next().await {
        let text = match frame? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let msg = match serde_json::from_str::<ServerMessage>(text.as_str()) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, frame = %text.as_str(), "invalid server message");
                continue;
            }
        };

        match answer(&msg) {
            None => {
                if let ServerMessage::Event { data } = &msg {
                    info!(%data, "event from server");
                }
            }
            Some(reply) => {
                if let ServerMessage::Request { id, data } = &msg {
                    info!(request = %id, %data, "answering request");
                }
                ws_stream.send(encode(&reply)?).await?;
                answered += 1;
                if max_requests.is_some_and(|max| answered >= max) {
                    ws_stream.close(None).await?;
                    break;
                }
            }
        }
    }

    info!(answered, "bridge client finished");
    Ok(())
}
