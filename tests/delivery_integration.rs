//! End-to-end delivery against an in-process LDN inbox.

mod common;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use tokio::net::TcpListener;

use common::{local_service, titled};
use ldn_outbox::config::DeliveryConfig;
use ldn_outbox::delivery::{DeliveryClient, DeliveryError, HttpDeliveryClient};
use ldn_outbox::message::{
    InMemoryEndpointRegistry, InMemoryResourceStore, QueueStatus, ServiceEndpoint, TriggerEvent,
    TriggerRule,
};
use ldn_outbox::notification::{NotificationBuilder, PatternStore};
use ldn_outbox::queue::{DrainOutcome, QueueManager};
use ldn_outbox::store::{MemoryMessageStore, MessageStore};

#[derive(Debug, Clone)]
struct Received {
    content_type: Option<String>,
    api_key: Option<String>,
    body: String,
}

#[derive(Clone)]
struct InboxState {
    status: StatusCode,
    delay: Option<StdDuration>,
    received: Arc<Mutex<Vec<Received>>>,
}

async fn inbox(State(state): State<InboxState>, headers: HeaderMap, body: String) -> StatusCode {
    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.received.lock().unwrap().push(Received {
        content_type: header("content-type"),
        api_key: header("x-api-key"),
        body,
    });
    state.status
}

/// Start an inbox on an ephemeral port; returns its URL and the request log.
async fn spawn_inbox(
    status: StatusCode,
    delay: Option<StdDuration>,
) -> (String, Arc<Mutex<Vec<Received>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = InboxState {
        status,
        delay,
        received: received.clone(),
    };
    let app = Router::new().route("/inbox", post(inbox)).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/inbox", addr), received)
}

fn client(request_timeout_ms: u64) -> HttpDeliveryClient {
    HttpDeliveryClient::new(&DeliveryConfig {
        connect_timeout_ms: 1_000,
        request_timeout_ms,
        user_agent: "ldn-outbox-test".to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_post_sends_ld_json_and_secret() {
    let (url, received) = spawn_inbox(StatusCode::CREATED, None).await;

    let status = client(5_000)
        .post(
            &url,
            r#"{"type":["Announce"]}"#,
            &[("X-Api-Key".to_string(), "k1".to_string())],
        )
        .await
        .unwrap();
    assert_eq!(status, 201);

    let received = received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].content_type.as_deref(), Some("application/ld+json"));
    assert_eq!(received[0].api_key.as_deref(), Some("k1"));
    assert_eq!(received[0].body, r#"{"type":["Announce"]}"#);
}

#[tokio::test]
async fn test_non_success_status_is_error() {
    let (url, _) = spawn_inbox(StatusCode::INTERNAL_SERVER_ERROR, None).await;

    let err = client(5_000).post(&url, "{}", &[]).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Status(500)));
}

#[tokio::test]
async fn test_slow_inbox_times_out() {
    let (url, _) = spawn_inbox(StatusCode::OK, Some(StdDuration::from_secs(3))).await;

    let err = client(200).post(&url, "{}", &[]).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Timeout(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_queue_delivers_over_http() {
    let (url, received) = spawn_inbox(StatusCode::ACCEPTED, None).await;

    let store = Arc::new(MemoryMessageStore::new());
    let resources = Arc::new(InMemoryResourceStore::new());
    resources.insert(titled("item-1", "Over the wire"));
    let endpoints = Arc::new(InMemoryEndpointRegistry::from_endpoints(vec![
        ServiceEndpoint::new("local-inbox", "Local inbox", "http://127.0.0.1")
            .with_inbox(url)
            .with_shared_secret("X-Api-Key", "wire-secret"),
    ]));
    let builder = Arc::new(NotificationBuilder::new(
        local_service(),
        Arc::new(PatternStore::with_defaults()),
    ));
    let manager = QueueManager::new(
        store.clone(),
        builder,
        Arc::new(client(5_000)),
        resources,
        endpoints,
        chrono::Duration::minutes(60),
    );

    let event = TriggerEvent::new(
        "item-1",
        vec![TriggerRule::new("item-1", "local-inbox", "request-review")],
    );
    let report = manager.enqueue(&event).await.unwrap();
    let id = report.queued[0].id.clone();

    assert_eq!(
        manager.drain_one().await.unwrap(),
        DrainOutcome::Delivered(id.clone())
    );

    let msg = store.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(msg.queue_status, QueueStatus::Processed);

    let received = received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].api_key.as_deref(), Some("wire-secret"));

    let body: serde_json::Value = serde_json::from_str(&received[0].body).unwrap();
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["type"][0], "Offer");
    assert_eq!(body["type"][1], "coar-notify:ReviewAction");
}
