use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tungstenite::protocol::Message as WsMessage;

use super::message::{ClientMessage, DemoEvent, ServerMessage};
use super::session::Session;
use super::websocket::serve;
use crate::config::BridgeSettings;
use crate::utils::error::BrokerError;

fn quiet_settings() -> BridgeSettings {
    BridgeSettings {
        ping_interval_ms: 60_000,
        request_delay_ms: 60_000,
        reply_timeout_ms: 1_000,
    }
}

#[test]
fn test_client_message_parsing() {
    let msg: ClientMessage =
        serde_json::from_value(json!({ "type": "event", "data": "hello" })).unwrap();
    assert!(matches!(msg, ClientMessage::Event { ref data, reply: None } if data == "hello"));

    let msg: ClientMessage =
        serde_json::from_value(json!({ "type": "event", "data": "hi", "reply": true })).unwrap();
    assert!(matches!(msg, ClientMessage::Event { reply: Some(true), .. }));

    let msg: ClientMessage =
        serde_json::from_value(json!({ "type": "reply", "id": "r1", "data": "fine" })).unwrap();
    assert!(matches!(msg, ClientMessage::Reply { ref id, ref data } if id == "r1" && data == "fine"));

    assert!(serde_json::from_value::<ClientMessage>(json!({ "type": "subscribe" })).is_err());
}

#[test]
fn test_server_message_serialization() {
    let request = ServerMessage::Request {
        id: "r1".to_string(),
        data: "how are you?".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({ "type": "request", "id": "r1", "data": "how are you?" })
    );
    let event = ServerMessage::Event {
        data: "ping0".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        json!({ "type": "event", "data": "ping0" })
    );
}

#[test]
fn test_demo_event_reply_defaults_to_false() {
    let event: DemoEvent = serde_json::from_value(json!({ "data": "x" })).unwrap();
    assert_eq!(event, DemoEvent::new("x"));
    assert!(DemoEvent::request("y").reply);
}

#[tokio::test]
async fn test_session_forwards_remote_events() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = Session::open("s1", tx, &quiet_settings());

    assert!(session.remote().emit(DemoEvent::new("ping0")).await);
    match rx.recv().await {
        Some(ServerMessage::Event { data }) => assert_eq!(data, "ping0"),
        other => panic!("expected an event frame, got {other:?}"),
    }
    session.close();
}

#[tokio::test]
async fn test_session_request_reply_round_trip() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = Session::open("s1", tx, &quiet_settings());

    let remote = session.remote();
    let request = tokio::spawn(async move {
        remote
            .emit_with_reply(DemoEvent::request("how are you?"))
            .await
    });

    let id = match rx.recv().await {
        Some(ServerMessage::Request { id, data }) => {
            assert_eq!(data, "how are you?");
            id
        }
        other => panic!("expected a request frame, got {other:?}"),
    };
    assert!(
        session
            .handle_client_message(ClientMessage::Reply {
                id: id.clone(),
                data: "fine".to_string(),
            })
            .await
    );

    let reply = request.await.unwrap().unwrap();
    assert_eq!(reply.data, "fine");

    // the request is answered only once
    assert!(
        !session
            .handle_client_message(ClientMessage::Reply {
                id,
                data: "again".to_string(),
            })
            .await
    );
    session.close();
}

#[tokio::test]
async fn test_session_request_times_out_without_reply() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let settings = BridgeSettings {
        reply_timeout_ms: 50,
        ..quiet_settings()
    };
    let session = Session::open("s1", tx, &settings);

    let result = session
        .remote()
        .emit_with_reply(DemoEvent::request("anyone?"))
        .await;
    assert!(matches!(result, Err(BrokerError::NoReply)));
    assert!(matches!(rx.recv().await, Some(ServerMessage::Request { .. })));

    // the broker keeps listening after a failed turn
    assert!(session.remote().is_on());
    session.close();
}

#[tokio::test]
async fn test_session_delivers_client_events_locally() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let session = Session::open("s1", tx, &quiet_settings());
    let local = session.local();

    let delivered = session
        .handle_client_message(ClientMessage::Event {
            data: "hello".to_string(),
            reply: None,
        })
        .await;
    assert!(delivered);

    session.close();
    assert!(!local.is_on());
    assert!(!local.emit(DemoEvent::new("late")));
}

#[tokio::test]
async fn test_session_close_stops_both_brokers() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut session = Session::open("s1", tx, &quiet_settings());
    session.start_traffic(&quiet_settings());
    let local = session.local();
    let remote = session.remote();
    assert!(local.is_on());
    assert!(remote.is_on());

    session.close();
    assert!(!local.is_on());
    assert!(!remote.is_on());
    assert!(!remote.emit(DemoEvent::new("late")).await);
}

#[tokio::test]
async fn test_bridge_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let settings = BridgeSettings {
        ping_interval_ms: 20,
        request_delay_ms: 50,
        reply_timeout_ms: 1_000,
    };
    tokio::spawn(serve(listener, settings));

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("client connect");

    ws.send(WsMessage::text(
        json!({ "type": "event", "data": "hello from client" }).to_string(),
    ))
    .await
    .unwrap();

    let mut pings = Vec::new();
    let mut answered = false;
    let outcome = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(Ok(frame)) = ws.next().await {
            let WsMessage::Text(text) = frame else {
                continue;
            };
            match serde_json::from_str::<ServerMessage>(text.as_str()).unwrap() {
                ServerMessage::Event { data } => pings.push(data),
                ServerMessage::Request { id, data } => {
                    assert_eq!(data, "how are you?");
                    let reply = json!({ "type": "reply", "id": id, "data": "fine" });
                    ws.send(WsMessage::text(reply.to_string())).await.unwrap();
                    answered = true;
                }
            }
            if answered && pings.len() >= 2 {
                break;
            }
        }
    })
    .await;

    assert!(outcome.is_ok(), "bridge traffic did not arrive in time");
    assert!(answered);
    assert_eq!(pings[0], "ping0");
    assert_eq!(pings[1], "ping1");
    ws.close(None).await.unwrap();
}
