//! In-process message store, used by tests and offline runs.

use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::watch;

use super::{MessageStore, SenderTag, StoreError, StoredMessage};

/// Message store backed by a plain Vec. Insertion order is timestamp order.
pub struct MemoryStore {
    messages: Mutex<Vec<StoredMessage>>,
    snapshot_tx: watch::Sender<Vec<StoredMessage>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Self {
            messages: Mutex::new(Vec::new()),
            snapshot_tx,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn republish(&self) {
        let snapshot = self.messages.lock().unwrap().clone();
        self.snapshot_tx.send_replace(snapshot);
    }
}

impl MessageStore for MemoryStore {
    async fn append(&self, text: &str, sender: SenderTag) -> Result<(), StoreError> {
        self.messages.lock().unwrap().push(StoredMessage {
            text: text.to_string(),
            sender,
            timestamp: Utc::now(),
        });
        self.republish();
        Ok(())
    }

    async fn refresh(&self) -> Result<(), StoreError> {
        self.republish();
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Vec<StoredMessage>> {
        self.snapshot_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_republishes_full_snapshot() {
        let store = MemoryStore::new();
        let rx = store.subscribe();
        assert!(rx.borrow().is_empty());

        store.append("hello", SenderTag::User).await.unwrap();
        store.append("hi!", SenderTag::Bot).await.unwrap();

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].text, "hello");
        assert_eq!(snapshot[0].sender, SenderTag::User);
        assert_eq!(snapshot[1].text, "hi!");
        assert_eq!(snapshot[1].sender, SenderTag::Bot);
        assert!(snapshot[0].timestamp <= snapshot[1].timestamp);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_after_subscribing() {
        let store = MemoryStore::new();
        store.append("first", SenderTag::User).await.unwrap();

        let mut rx = store.subscribe();
        assert_eq!(rx.borrow_and_update().len(), 1);

        store.append("second", SenderTag::Bot).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);
    }
}
