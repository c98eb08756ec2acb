use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use event_broker::broker::HandlerError;
use event_broker::client::run_client;
use event_broker::config::BridgeSettings;
use event_broker::transport::serve;
use event_broker::{AsyncEventBroker, BrokerError, EventBroker, TopicBroker};
use tokio::net::TcpListener;

#[test]
fn integration_sync_request_reply_across_threads() {
    let broker: Arc<EventBroker<u32, u32>> = Arc::new(EventBroker::new());
    let id = broker.on(|n: u32| Ok(Some(n * 2))).expect("idle broker");

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let broker = Arc::clone(&broker);
            std::thread::spawn(move || broker.emit_with_reply(n).unwrap())
        })
        .collect();
    let mut replies: Vec<u32> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    replies.sort_unstable();
    assert_eq!(replies, vec![0, 2, 4, 6]);

    assert!(broker.off(&id).unwrap());
    assert!(matches!(broker.emit_with_reply(1), Err(BrokerError::NotListening)));
}

#[tokio::test]
async fn integration_async_listener_counts_its_turns() {
    let broker: AsyncEventBroker<String, usize> = AsyncEventBroker::new();
    let turns = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&turns);
    let id = broker
        .on(move |_event: String| {
            let turn = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, HandlerError>(Some(turn)) }
        })
        .expect("idle broker");

    assert!(broker.emit("a".to_string()).await);
    assert_eq!(broker.emit_with_reply("b".to_string()).await.unwrap(), 2);
    assert!(broker.off(&id).unwrap());
    assert_eq!(turns.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn integration_topics_route_to_their_own_listeners() {
    let topics: TopicBroker<String, String> = TopicBroker::new();
    topics
        .on("orders", |e: String| async move { Ok::<_, HandlerError>(Some(format!("order:{e}"))) })
        .unwrap();
    topics
        .on("audit", |e: String| async move { Ok::<_, HandlerError>(Some(format!("audit-a:{e}"))) })
        .unwrap();
    topics
        .on("audit", |e: String| async move { Ok::<_, HandlerError>(Some(format!("audit-b:{e}"))) })
        .unwrap();

    assert_eq!(topics.topic_names(), vec!["audit", "orders"]);
    assert_eq!(
        topics.emit_with_reply("orders", "1".to_string()).await.unwrap(),
        "order:1"
    );
    assert_eq!(
        topics
            .emit_with_replies("audit", "2".to_string())
            .await
            .unwrap(),
        vec!["audit-a:2".to_string(), "audit-b:2".to_string()]
    );
    assert!(matches!(
        topics.emit_with_reply("audit", "3".to_string()).await,
        Err(BrokerError::MultipleReplies(2))
    ));
}

#[tokio::test]
async fn integration_bridge_with_demo_client() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let settings = BridgeSettings {
        ping_interval_ms: 10,
        request_delay_ms: 20,
        reply_timeout_ms: 1_000,
    };
    tokio::spawn(serve(listener, settings));

    let url = format!("ws://{addr}/ws");
    let run = run_client(&url, "hello", Some(1));
    let result = tokio::time::timeout(Duration::from_secs(5), run).await;
    assert!(matches!(result, Ok(Ok(()))));
}
