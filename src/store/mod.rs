//! Message store module: per-user chat history persistence.

mod firestore;
mod memory;

pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;

/// Persistence label for a stored message. Distinct from the model-facing
/// transcript roles: the store records who the reader saw speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderTag {
    User,
    Bot,
}

impl SenderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderTag::User => "user",
            SenderTag::Bot => "bot",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(SenderTag::User),
            "bot" => Some(SenderTag::Bot),
            _ => None,
        }
    }
}

/// One persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub text: String,
    pub sender: SenderTag,
    pub timestamp: DateTime<Utc>,
}

/// Message store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned status {0}")]
    Status(u16),
    #[error("malformed store response: {0}")]
    Malformed(String),
}

/// Append-and-subscribe interface over the chat history.
///
/// `subscribe` hands out a watch receiver that carries the full history,
/// ordered by timestamp; the whole snapshot is replaced on every change.
pub trait MessageStore {
    /// Persist one message. The timestamp is assigned by the store.
    fn append(
        &self,
        text: &str,
        sender: SenderTag,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Re-read the history and republish the snapshot.
    fn refresh(&self) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Subscribe to history snapshots.
    fn subscribe(&self) -> watch::Receiver<Vec<StoredMessage>>;
}
