// Copyright 2025 prodichat developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Prodichat
//!
//! Chatbot client with Gemini-backed replies, managed-identity auth, and
//! per-user message persistence.
//!
//! The heart of the crate is [`ResponseFetcher`]: it owns the running
//! conversation transcript, replays it to the inference endpoint on every
//! call, retries with exponential backoff, and masks all failure as a fixed
//! apology reply. Around it, [`ChatSession`] orchestrates the display
//! stream and the message store, and [`AuthWatcher`] broadcasts identity
//! changes from the managed auth service.
//!
//! ## Example
//!
//! ```rust,no_run
//! use prodichat::{
//!     ChatSession, GeminiClient, GeminiConfig, MemoryStore, ResponseFetcher, RetryPolicy,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = GeminiClient::new(GeminiConfig::default().with_api_key("..."));
//!     let fetcher = ResponseFetcher::new(client, RetryPolicy::default());
//!
//!     let (mut session, _events) = ChatSession::new(fetcher, MemoryStore::new());
//!
//!     if let Some(reply) = session.send_message("Hello!").await {
//!         println!("bot: {}", reply);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod chat;
pub mod model;
pub mod settings;
pub mod store;

pub use auth::{AuthClient, AuthConfig, AuthError, AuthSession, AuthWatcher};
pub use chat::{ChatEvent, ChatSession, GREETING};
pub use model::{
    GeminiClient, GeminiConfig, GenerateTransport, ResponseFetcher, RetryPolicy, Role, Transcript,
    TransportError, Turn, APOLOGY_REPLY,
};
pub use settings::AppSettings;
pub use store::{
    FirestoreConfig, FirestoreStore, MemoryStore, MessageStore, SenderTag, StoreError,
    StoredMessage,
};
