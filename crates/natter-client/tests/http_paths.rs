//! End-to-end request/response paths against a canned one-shot HTTP
//! server: non-success status, chunked streaming, empty body, and the
//! plugin JSON reply.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use natter_client::{ChatClient, SendOptions, SendOutcome, SendStatus};
use natter_core::config::{AppConfig, Plugin, PluginKey};
use natter_core::message::{Message, MessageRole};
use natter_core::notify::Notifier;
use natter_store::SessionStore;
use natter_storage::MemoryStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingNotifier {
    errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, _message: &str) {}
    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Accepts exactly one connection, reads the full request, answers
/// with the canned bytes, and hands the captured request back.
async fn serve_once(response: Vec<u8>) -> (SocketAddr, tokio::sync::oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut tmp = [0u8; 4096];
        let request = loop {
            let n = sock.read(&mut tmp).await.unwrap();
            if n == 0 {
                break String::from_utf8_lossy(&buf).into_owned();
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(header_end) = find(&buf, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
                let content_length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break String::from_utf8_lossy(&buf).into_owned();
                }
            }
        };
        let _ = tx.send(request);
        sock.write_all(&response).await.unwrap();
        let _ = sock.shutdown().await;
    });

    (addr, rx)
}

fn chunked_response(parts: &[&str]) -> Vec<u8> {
    let mut resp = Vec::from(
        &b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n"[..],
    );
    for part in parts {
        resp.extend_from_slice(format!("{:x}\r\n{part}\r\n", part.len()).as_bytes());
    }
    resp.extend_from_slice(b"0\r\n\r\n");
    resp
}

fn json_response(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

struct Harness {
    client: ChatClient,
    store: SessionStore,
    notifier: Arc<RecordingNotifier>,
}

fn harness(endpoint: String) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut config = AppConfig::default();
    config.endpoint = endpoint;
    config.api_key = Some("sk-test".into());
    Harness {
        client: ChatClient::new(config, notifier.clone()),
        store: SessionStore::new(Arc::new(MemoryStore::new()), notifier.clone()),
        notifier,
    }
}

#[tokio::test]
async fn non_success_status_appends_no_assistant_entry() {
    let (addr, _req) = serve_once(
        b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            .to_vec(),
    )
    .await;
    let mut h = harness(format!("http://{addr}/chat"));
    let cancel = CancellationToken::new();

    let outcome = h
        .client
        .send(
            &mut h.store,
            Message::new_user("hello".into()),
            SendOptions::default(),
            &cancel,
        )
        .await;

    assert_eq!(outcome, SendOutcome::Failed);
    // the outgoing user message stays; nothing was appended after it
    let messages = &h.store.sessions()[0].messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(h.client.status(), SendStatus::default());
    // surfaced as a transient notification
    assert_eq!(h.notifier.errors().len(), 1);
    assert!(h.notifier.errors()[0].contains("500"));
}

#[tokio::test]
async fn streaming_reply_lands_and_names_the_session() {
    let (addr, _req) = serve_once(chunked_response(&["Hello world"])).await;
    let mut h = harness(format!("http://{addr}/chat"));
    let cancel = CancellationToken::new();

    let question = "q".repeat(45);
    let outcome = h
        .client
        .send(
            &mut h.store,
            Message::new_user(question),
            SendOptions::default(),
            &cancel,
        )
        .await;

    assert_eq!(outcome, SendOutcome::Success);
    let session = &h.store.sessions()[0];
    assert_eq!(session.messages.len(), 2);
    let reply = &session.messages[1];
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.content, "Hello world");
    assert!(!reply.streaming);
    // first exchange derives the topic: 30 chars + ellipsis
    assert_eq!(session.topic, format!("{}...", "q".repeat(30)));
    assert_eq!(h.client.status(), SendStatus::default());
    assert!(h.notifier.errors().is_empty());
}

#[tokio::test]
async fn empty_body_settles_failed_silently() {
    let (addr, _req) = serve_once(
        b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_vec(),
    )
    .await;
    let mut h = harness(format!("http://{addr}/chat"));
    let cancel = CancellationToken::new();

    let outcome = h
        .client
        .send(
            &mut h.store,
            Message::new_user("anyone there?".into()),
            SendOptions::default(),
            &cancel,
        )
        .await;

    assert_eq!(outcome, SendOutcome::Failed);
    assert_eq!(h.store.sessions()[0].messages.len(), 1);
    assert_eq!(h.client.status(), SendStatus::default());
    // unlike an HTTP error, nothing is surfaced to the user
    assert!(h.notifier.errors().is_empty());
}

#[tokio::test]
async fn plugin_reply_is_consumed_atomically() {
    let (addr, req) = serve_once(json_response(r#"{"answer":"The answer is 42."}"#)).await;
    let mut h = harness("http://unused.invalid/chat".into());
    let cancel = CancellationToken::new();

    let plugin = Plugin {
        id: "google-search".into(),
        name: "Google Search".into(),
        endpoint: format!("http://{addr}/plugin"),
        required_keys: vec![PluginKey {
            key: "googleAPIKey".into(),
            value: "g-key".into(),
        }],
    };

    let outcome = h
        .client
        .send(
            &mut h.store,
            Message::new_user("what is the answer?".into()),
            SendOptions {
                plugin: Some(plugin),
                ..SendOptions::default()
            },
            &cancel,
        )
        .await;

    assert_eq!(outcome, SendOutcome::Success);
    let messages = &h.store.sessions()[0].messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "The answer is 42.");
    assert!(!messages[1].streaming);

    // the plugin's credential fields rode along in the body
    let request = req.await.unwrap();
    assert!(request.contains(r#""googleAPIKey":"g-key""#));
    assert!(request.contains(r#""model""#));
}

#[tokio::test]
async fn truncate_count_drops_trailing_turns_before_resending() {
    let (addr, _req) = serve_once(chunked_response(&["better answer"])).await;
    let mut h = harness(format!("http://{addr}/chat"));
    let cancel = CancellationToken::new();

    // a previous exchange to regenerate over
    h.store.on_new_message(Message::new_user("original question".into()));
    h.store.on_new_message(Message::new(
        MessageRole::Assistant,
        "stale answer".into(),
    ));

    let outcome = h
        .client
        .send(
            &mut h.store,
            Message::new_user("original question".into()),
            SendOptions {
                truncate_count: 2,
                ..SendOptions::default()
            },
            &cancel,
        )
        .await;

    assert_eq!(outcome, SendOutcome::Success);
    let messages = &h.store.sessions()[0].messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "original question");
    assert_eq!(messages[1].content, "better answer");
}
