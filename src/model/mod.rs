//! Model module: transcript state and the retrying inference call wrapper.

mod client;
mod fetcher;

pub use client::{GeminiClient, GeminiConfig, GenerateTransport, TransportError};
pub use fetcher::{
    ResponseFetcher, RetryPolicy, Role, Transcript, Turn, APOLOGY_REPLY,
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
};
