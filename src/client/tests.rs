use tokio::net::TcpListener;

use super::bridge_client::{DEFAULT_ANSWER, answer, run_client};
use crate::config::BridgeSettings;
use crate::transport::{ClientMessage, ServerMessage, serve};

#[test]
fn test_events_need_no_answer() {
    let msg = ServerMessage::Event {
        data: "ping0".to_string(),
    };
    assert!(answer(&msg).is_none());
}

#[test]
fn test_requests_are_answered_with_their_id() {
    let msg = ServerMessage::Request {
        id: "r-42".to_string(),
        data: "how are you?".to_string(),
    };
    match answer(&msg) {
        Some(ClientMessage::Reply { id, data }) => {
            assert_eq!(id, "r-42");
            assert_eq!(data, DEFAULT_ANSWER);
        }
        other => panic!("expected a reply, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_answers_bridge_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let settings = BridgeSettings {
        ping_interval_ms: 10,
        request_delay_ms: 30,
        reply_timeout_ms: 1_000,
    };
    tokio::spawn(serve(listener, settings));

    let url = format!("ws://{addr}/ws");
    let run = run_client(&url, "hello", Some(1));
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), run).await;
    assert!(matches!(result, Ok(Ok(()))));
}

#[tokio::test]
async fn test_client_reports_connect_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = run_client(&format!("ws://{addr}/ws"), "hello", Some(1)).await;
    assert!(result.is_err());
}
