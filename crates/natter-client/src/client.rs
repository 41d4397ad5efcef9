use std::sync::Arc;

use bytes::Bytes;
use natter_core::config::{AppConfig, Plugin};
use natter_core::error::ChatError;
use natter_core::message::{Message, MessageRole};
use natter_core::notify::Notifier;
use natter_core::session::Session;
use natter_store::SessionStore;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Session topics derive from the first user message, cut at this many
/// characters.
const TOPIC_MAX_CHARS: usize = 30;

/// How one send operation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Success,
    Aborted,
    Failed,
}

/// UI-visible progress flags for the send in flight. `loading` covers
/// the request up to the first chunk; `streaming` covers the whole
/// operation until it settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStatus {
    pub loading: bool,
    pub streaming: bool,
}

/// Knobs for one send operation.
#[derive(Default)]
pub struct SendOptions {
    /// Trailing messages to drop before appending the outgoing one
    /// (edit-and-resend uses the distance to the edited message,
    /// regenerate uses 2).
    pub truncate_count: usize,
    /// Route through a non-streaming plugin endpoint instead of the
    /// default chat endpoint.
    pub plugin: Option<Plugin>,
    /// Receives each raw chunk's text so a UI can render deltas
    /// without reading the store mid-stream.
    pub delta_tx: Option<mpsc::UnboundedSender<String>>,
}

#[derive(Serialize)]
struct WireMessage {
    role: MessageRole,
    content: String,
}

#[derive(Serialize)]
struct ChatBody {
    model: String,
    messages: Vec<WireMessage>,
    key: String,
    prompt: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct PluginAnswer {
    answer: String,
}

/// Issues chat requests and applies the reply back into the session
/// store: incrementally for the default streaming path, atomically
/// for the plugin path.
pub struct ChatClient {
    http: reqwest::Client,
    config: AppConfig,
    notifier: Arc<dyn Notifier>,
    status: SendStatus,
}

impl ChatClient {
    pub fn new(config: AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            notifier,
            status: SendStatus::default(),
        }
    }

    pub fn status(&self) -> SendStatus {
        self.status
    }

    fn build_body(
        &self,
        session: &Session,
        memory: &Message,
        plugin: Option<&Plugin>,
    ) -> serde_json::Value {
        // condensed history summary rides ahead of the live turns
        let mut messages = Vec::with_capacity(session.messages.len() + 1);
        if !memory.content.is_empty() {
            messages.push(WireMessage {
                role: memory.role,
                content: memory.content.clone(),
            });
        }
        messages.extend(session.messages.iter().map(|m| WireMessage {
            role: m.role,
            content: m.content.clone(),
        }));

        let body = ChatBody {
            model: self.config.model.clone(),
            messages,
            key: self.config.api_key.clone().unwrap_or_default(),
            prompt: self.config.system_prompt.clone(),
            temperature: self.config.temperature,
        };
        let mut value = serde_json::to_value(&body).unwrap_or_default();
        if let Some(plugin) = plugin {
            for key in &plugin.required_keys {
                value[&key.key] = serde_json::Value::String(key.value.clone());
            }
        }
        value
    }

    /// Sends `message` on the active session and settles once the
    /// reply is fully applied, aborted, or failed. Cancellation is
    /// cooperative: `cancel` is polled between chunk reads, never
    /// mid-chunk.
    pub async fn send(
        &mut self,
        store: &mut SessionStore,
        message: Message,
        options: SendOptions,
        cancel: &CancellationToken,
    ) -> SendOutcome {
        debug!(phase = "sending");
        self.status = SendStatus {
            loading: true,
            streaming: true,
        };

        // Edit-and-resend / regenerate drop trailing turns first.
        if options.truncate_count > 0 {
            let truncate = options.truncate_count;
            store.update_current_session(|session| {
                for _ in 0..truncate {
                    session.messages.pop();
                }
            });
        }
        store.on_new_message(message.clone());

        let memory = store.memory_prompt();
        let body = self.build_body(store.current_session(), &memory, options.plugin.as_ref());
        let endpoint = options
            .plugin
            .as_ref()
            .map_or(self.config.endpoint.as_str(), |p| p.endpoint.as_str())
            .to_string();

        let resp = match self.http.post(&endpoint).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                return self.settle_failed(&ChatError::Http(e.to_string()));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return self.settle_failed(&ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if options.plugin.is_some() {
            return self.consume_plugin_reply(store, resp).await;
        }

        // The first exchange names the session.
        if store.current_session().messages.len() == 1 {
            let topic = derive_topic(&message.content);
            store.update_current_session(|session| session.topic = topic);
        }

        self.status.loading = false;
        let outcome = self
            .consume_stream(store, resp.bytes_stream(), options.delta_tx.as_ref(), cancel)
            .await;
        self.status.streaming = false;
        debug!(?outcome, phase = "settled");
        outcome
    }

    /// Reads the chunked reply and keeps the trailing assistant
    /// message in sync. The first chunk creates the message; every
    /// later chunk replaces its content with the entire accumulated
    /// text so far. Full replacement (never delta-append) keeps the
    /// message correct across decoder chunk-boundary artifacts.
    async fn consume_stream<S, E>(
        &mut self,
        store: &mut SessionStore,
        stream: S,
        delta_tx: Option<&mpsc::UnboundedSender<String>>,
        cancel: &CancellationToken,
    ) -> SendOutcome
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let mut stream = std::pin::pin!(stream);
        let mut text = String::new();
        let mut first = true;

        loop {
            if cancel.is_cancelled() {
                debug!(phase = "aborted");
                // whatever partial content exists is final
                self.finalize_tail(store);
                return SendOutcome::Aborted;
            }

            let Some(next) = stream.next().await else {
                break;
            };
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.mark_tail_error(store);
                    return self.settle_failed(&ChatError::Stream(e.to_string()));
                }
            };

            let piece = String::from_utf8_lossy(&chunk).into_owned();
            text.push_str(&piece);
            if let Some(tx) = delta_tx {
                let _ = tx.send(piece.clone());
            }

            if first {
                first = false;
                debug!(phase = "streaming_first_chunk");
                store.on_new_message(Message::new_assistant(
                    piece,
                    Some(self.config.model.clone()),
                ));
            } else {
                debug!(phase = "streaming_append");
                let session_index = store.current_session_index();
                let tail = store.current_session().messages.len() - 1;
                let full = text.clone();
                store.update_message(session_index, tail, move |m| m.content = full);
            }
        }

        if first {
            // empty reply body: reset quietly, nothing was appended
            self.status = SendStatus::default();
            return SendOutcome::Failed;
        }
        self.finalize_tail(store);
        SendOutcome::Success
    }

    /// The plugin path: one complete `{answer}` object, applied as a
    /// single assistant message and persisted on settle.
    async fn consume_plugin_reply(
        &mut self,
        store: &mut SessionStore,
        resp: reqwest::Response,
    ) -> SendOutcome {
        match resp.json::<PluginAnswer>().await {
            Ok(PluginAnswer { answer }) => {
                let mut reply = Message::new_assistant(answer, Some(self.config.model.clone()));
                reply.streaming = false;
                store.on_new_message(reply);
                self.status = SendStatus::default();
                debug!(phase = "settled", outcome = "success");
                SendOutcome::Success
            }
            Err(e) => self.settle_failed(&ChatError::Stream(e.to_string())),
        }
    }

    /// Marks the streaming tail message final and persists it.
    fn finalize_tail(&self, store: &mut SessionStore) {
        let session_index = store.current_session_index();
        let Some(tail) = store.current_session().messages.len().checked_sub(1) else {
            return;
        };
        store.update_message(session_index, tail, |m| m.streaming = false);
    }

    fn mark_tail_error(&self, store: &mut SessionStore) {
        let session_index = store.current_session_index();
        let Some(tail) = store.current_session().messages.len().checked_sub(1) else {
            return;
        };
        store.update_message(session_index, tail, |m| {
            m.streaming = false;
            m.is_error = true;
        });
    }

    fn settle_failed(&mut self, error: &ChatError) -> SendOutcome {
        self.status = SendStatus::default();
        self.notifier.error(&error.to_string());
        debug!(%error, phase = "settled", outcome = "failed");
        SendOutcome::Failed
    }
}

/// First exchange topic: the leading characters of the user message,
/// ellipsis-appended when it was cut. Counts characters, not bytes,
/// so multi-byte input never splits.
pub fn derive_topic(content: &str) -> String {
    let mut chars = content.chars();
    let mut topic: String = chars.by_ref().take(TOPIC_MAX_CHARS).collect();
    if chars.next().is_some() {
        topic.push_str("...");
    }
    topic
}
