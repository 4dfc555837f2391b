//! End-to-end tests against an in-process mock mailbox backend.
//!
//! Spins up a real axum server on a free port — REST collection routes plus
//! the `/ws/emails` push channel — and drives the transport client, the live
//! feed, and the store over real sockets.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as AxumWsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{any, delete, get},
    Json, Router,
};
use tokio::sync::{broadcast, RwLock};
use tokio::time::timeout;
use uuid::Uuid;

use mailwatch::client::{MailboxClient, TransportError};
use mailwatch::config::Config;
use mailwatch::events::MailboxEvent;
use mailwatch::mailbox::Message;
use mailwatch::AppContext;

const ATTACHMENT_BYTES: &[u8] = b"%PDF-1.4 mock attachment payload";
/// Feed frame that makes the mock server close the WebSocket.
const CLOSE_SENTINEL: &str = "__close__";

// ─── Mock backend ─────────────────────────────────────────────────────────────

#[derive(Clone)]
struct MockBackend {
    emails: Arc<RwLock<Vec<Message>>>,
    feed_tx: broadcast::Sender<String>,
}

impl MockBackend {
    /// Store a new message and push it to every connected feed client,
    /// the way the real backend broadcasts on SMTP delivery.
    async fn push(&self, message: Message) {
        self.emails.write().await.insert(0, message.clone());
        let _ = self
            .feed_tx
            .send(serde_json::to_string(&message).unwrap());
    }

    /// Push a raw frame without touching the store (malformed payloads,
    /// close sentinel).
    fn push_raw(&self, frame: &str) {
        let _ = self.feed_tx.send(frame.to_string());
    }
}

async fn list_emails(State(state): State<MockBackend>) -> Json<Vec<Message>> {
    Json(state.emails.read().await.clone())
}

async fn clear_emails(State(state): State<MockBackend>) -> StatusCode {
    state.emails.write().await.clear();
    StatusCode::NO_CONTENT
}

async fn delete_email(State(state): State<MockBackend>, Path(id): Path<String>) -> StatusCode {
    let mut emails = state.emails.write().await;
    let before = emails.len();
    emails.retain(|m| m.id != id);
    if emails.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn get_attachment(
    State(state): State<MockBackend>,
    Path((message_id, attachment_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let emails = state.emails.read().await;
    let found = emails
        .iter()
        .filter(|m| m.id == message_id)
        .flat_map(|m| m.attachments.iter())
        .any(|a| a.id == attachment_id);
    if found {
        (StatusCode::OK, ATTACHMENT_BYTES.to_vec()).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn feed_ws(ws: WebSocketUpgrade, State(state): State<MockBackend>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_feed(socket, state))
}

async fn forward_feed(mut socket: WebSocket, state: MockBackend) {
    let mut rx = state.feed_tx.subscribe();
    while let Ok(frame) = rx.recv().await {
        if frame == CLOSE_SENTINEL {
            let _ = socket.send(AxumWsMessage::Close(None)).await;
            break;
        }
        if socket.send(AxumWsMessage::Text(frame.into())).await.is_err() {
            break;
        }
    }
}

/// Start the mock backend on a free port; returns its base URL and state.
async fn start_mock_backend(seed: Vec<Message>) -> (String, MockBackend) {
    let state = MockBackend {
        emails: Arc::new(RwLock::new(seed)),
        feed_tx: broadcast::channel(64).0,
    };
    let router = Router::new()
        .route("/api/emails", get(list_emails).delete(clear_emails))
        .route("/api/emails/{id}", delete(delete_email))
        .route(
            "/api/emails/{id}/attachments/{attachment_id}",
            get(get_attachment),
        )
        .route("/ws/emails", any(feed_ws))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

fn sample_message(id: Option<&str>, to: &[&str]) -> Message {
    Message {
        id: id.map(str::to_string).unwrap_or_else(|| Uuid::new_v4().to_string()),
        from: Some("sender@example.com".to_string()),
        to: to.iter().map(|s| s.to_string()).collect(),
        cc: Vec::new(),
        bcc: Vec::new(),
        subject: Some("integration".to_string()),
        body: Some("body".to_string()),
        received_at: "2026-07-01T10:00:00Z".to_string(),
        raw_message: String::new(),
        attachments: Vec::new(),
    }
}

fn test_context(base_url: &str) -> AppContext {
    AppContext::new(Config {
        server_url: base_url.to_string(),
        ..Config::default()
    })
}

/// Wait for the next event of interest, failing the test after 5 s.
async fn next_event(
    events: &mut broadcast::Receiver<MailboxEvent>,
) -> MailboxEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// The client reports `FeedConnected` as soon as its handshake finishes,
/// which can be a beat before the server-side task subscribes to the push
/// channel.  Wait for that subscription so a push is never dropped.
async fn wait_for_feed_subscriber(state: &MockBackend) {
    timeout(Duration::from_secs(5), async {
        while state.feed_tx.receiver_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no feed subscriber appeared");
}

// ─── Transport client ─────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_all_returns_the_backend_list() {
    let seed = vec![
        sample_message(Some("m1"), &["a@x.com"]),
        sample_message(Some("m2"), &["b@x.com"]),
    ];
    let (base, _state) = start_mock_backend(seed).await;

    let client = MailboxClient::new(format!("{base}/api/emails"));
    let messages = client.fetch_all().await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, "m1");
    assert_eq!(messages[1].to, vec!["b@x.com"]);
}

#[tokio::test]
async fn remove_deletes_remotely_and_rejects_unknown_ids() {
    let seed = vec![sample_message(Some("m1"), &["a@x.com"])];
    let (base, _state) = start_mock_backend(seed).await;
    let client = MailboxClient::new(format!("{base}/api/emails"));

    client.remove("m1").await.unwrap();
    assert!(client.fetch_all().await.unwrap().is_empty());

    match client.remove("ghost").await {
        Err(TransportError::Status(status)) => assert_eq!(status, StatusCode::NOT_FOUND),
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[tokio::test]
async fn clear_all_empties_the_backend() {
    let seed = vec![
        sample_message(None, &["a@x.com"]),
        sample_message(None, &["b@x.com"]),
    ];
    let (base, _state) = start_mock_backend(seed).await;
    let client = MailboxClient::new(format!("{base}/api/emails"));

    client.clear_all().await.unwrap();
    assert!(client.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn fetch_attachment_downloads_the_bytes() {
    let mut message = sample_message(Some("m1"), &["a@x.com"]);
    message.attachments.push(mailwatch::mailbox::Attachment {
        id: "att-1".to_string(),
        file_name: "report.pdf".to_string(),
        content_type: Some("application/pdf".to_string()),
        size: ATTACHMENT_BYTES.len() as u64,
    });
    let (base, _state) = start_mock_backend(vec![message]).await;
    let client = MailboxClient::new(format!("{base}/api/emails"));

    let bytes = client.fetch_attachment("m1", "att-1").await.unwrap();
    assert_eq!(bytes, ATTACHMENT_BYTES);

    match client.fetch_attachment("m1", "ghost").await {
        Err(TransportError::Status(status)) => assert_eq!(status, StatusCode::NOT_FOUND),
        other => panic!("expected a status error, got {other:?}"),
    }
}

// ─── Live feed ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn feed_messages_merge_into_the_store() {
    let (base, state) = start_mock_backend(vec![sample_message(Some("m1"), &["a@x.com"])]).await;
    let ctx = test_context(&base);

    // Initial bulk load, then the live feed on top of it.
    let loaded = ctx.client.fetch_all().await.unwrap();
    ctx.mailbox.write().await.load(loaded);

    let mut events = ctx.broadcaster.subscribe();
    let feed = ctx.spawn_feed();
    assert!(matches!(next_event(&mut events).await, MailboxEvent::FeedConnected));
    wait_for_feed_subscriber(&state).await;

    state.push(sample_message(Some("m2"), &["b@x.com"])).await;
    match next_event(&mut events).await {
        MailboxEvent::MessageArrived(message) => assert_eq!(message.id, "m2"),
        other => panic!("expected an arrival, got {other:?}"),
    }

    // Redelivery of an id replaces and promotes instead of duplicating.
    state.push(sample_message(Some("m1"), &["a@x.com"])).await;
    assert!(matches!(
        next_event(&mut events).await,
        MailboxEvent::MessageArrived(_)
    ));

    let store = ctx.mailbox.read().await;
    let ids: Vec<&str> = store.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
    drop(store);

    feed.shutdown_and_join().await;
}

#[tokio::test]
async fn malformed_frame_is_dropped_without_killing_the_feed() {
    let (base, state) = start_mock_backend(Vec::new()).await;
    let ctx = test_context(&base);

    let mut events = ctx.broadcaster.subscribe();
    let feed = ctx.spawn_feed();
    assert!(matches!(next_event(&mut events).await, MailboxEvent::FeedConnected));
    wait_for_feed_subscriber(&state).await;

    state.push_raw("{this is not json");
    state.push(sample_message(Some("m1"), &["a@x.com"])).await;

    // The well-formed frame after the bad one still arrives.
    match next_event(&mut events).await {
        MailboxEvent::MessageArrived(message) => assert_eq!(message.id, "m1"),
        other => panic!("expected an arrival, got {other:?}"),
    }
    assert_eq!(ctx.mailbox.read().await.len(), 1);

    feed.shutdown_and_join().await;
}

#[tokio::test]
async fn feed_reconnects_after_a_server_side_close() {
    let (base, state) = start_mock_backend(Vec::new()).await;
    let ctx = test_context(&base);

    let mut events = ctx.broadcaster.subscribe();
    let feed = ctx.spawn_feed();
    assert!(matches!(next_event(&mut events).await, MailboxEvent::FeedConnected));
    wait_for_feed_subscriber(&state).await;

    state.push_raw(CLOSE_SENTINEL);
    assert!(matches!(
        next_event(&mut events).await,
        MailboxEvent::FeedDisconnected
    ));

    // The fixed reconnect delay is 5 s; allow a little slack on top.
    let reconnected = timeout(Duration::from_secs(8), events.recv())
        .await
        .expect("feed did not reconnect")
        .unwrap();
    assert!(matches!(reconnected, MailboxEvent::FeedConnected));
    wait_for_feed_subscriber(&state).await;

    // The re-established subscription delivers again.
    state.push(sample_message(Some("m1"), &["a@x.com"])).await;
    match next_event(&mut events).await {
        MailboxEvent::MessageArrived(message) => assert_eq!(message.id, "m1"),
        other => panic!("expected an arrival, got {other:?}"),
    }

    feed.shutdown_and_join().await;
}

#[tokio::test]
async fn feed_shutdown_is_idempotent() {
    let (base, _state) = start_mock_backend(Vec::new()).await;
    let ctx = test_context(&base);

    let mut events = ctx.broadcaster.subscribe();
    let feed = ctx.spawn_feed();
    assert!(matches!(next_event(&mut events).await, MailboxEvent::FeedConnected));

    feed.shutdown();
    feed.shutdown();
    feed.shutdown_and_join().await;
}
