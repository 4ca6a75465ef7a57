//! Chat session orchestration: display events, persistence, and replies.

use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::model::{GenerateTransport, ResponseFetcher};
use crate::store::{MessageStore, SenderTag, StoredMessage};

/// Fixed opening line shown when a session starts. Never persisted.
pub const GREETING: &str = "Hello! I'm your friendly chatbot. How can I assist you today?";

/// Events emitted to whatever renders the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message { text: String, sender: SenderTag },
}

/// Orchestrates one conversation: pushes each message to the display stream,
/// persists it, and obtains replies through the response fetcher.
///
/// `send_message` takes `&mut self`, so a session processes one exchange at
/// a time; callers keep the input surface disabled while a call is
/// outstanding.
pub struct ChatSession<T, S> {
    fetcher: ResponseFetcher<T>,
    store: S,
    events_tx: mpsc::UnboundedSender<ChatEvent>,
}

impl<T: GenerateTransport, S: MessageStore> ChatSession<T, S> {
    /// Create a session and the event stream its renderer drains. The
    /// greeting is emitted immediately.
    pub fn new(
        fetcher: ResponseFetcher<T>,
        store: S,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            fetcher,
            store,
            events_tx,
        };
        session.emit(GREETING, SenderTag::Bot);
        (session, events_rx)
    }

    /// Send one user message through the full flow: display, persist, fetch
    /// the reply, display and persist it.
    ///
    /// Empty (or whitespace-only) input is rejected up front with no side
    /// effects. Returns the reply, which is the apology string when the
    /// endpoint stayed unreachable.
    pub async fn send_message(&mut self, input: &str) -> Option<String> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        self.emit(text, SenderTag::User);
        self.persist(text, SenderTag::User).await;

        let reply = self.fetcher.fetch_reply(text).await;

        self.emit(&reply, SenderTag::Bot);
        self.persist(&reply, SenderTag::Bot).await;

        Some(reply)
    }

    /// Subscribe to persisted-history snapshots, for the initial render.
    pub fn history(&self) -> watch::Receiver<Vec<StoredMessage>> {
        self.store.subscribe()
    }

    /// Re-read the persisted history.
    pub async fn load_history(&self) {
        if let Err(e) = self.store.refresh().await {
            warn!(error = %e, "failed to load message history");
        }
    }

    fn emit(&self, text: &str, sender: SenderTag) {
        // The renderer may have gone away; the conversation continues.
        let _ = self.events_tx.send(ChatEvent::Message {
            text: text.to_string(),
            sender,
        });
    }

    async fn persist(&self, text: &str, sender: SenderTag) {
        if let Err(e) = self.store.append(text, sender).await {
            warn!(error = %e, "failed to persist message, continuing without it");
        }
    }
}
