//! Response fetcher: the conversation transcript and the retrying call
//! wrapper around the inference endpoint.

use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use super::client::GenerateTransport;

/// Fixed user-facing reply returned once every attempt has failed.
pub const APOLOGY_REPLY: &str =
    "I'm sorry, I'm having trouble connecting right now. Please try again later.";

/// Default number of attempts for an inference call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Default multiplier applied to the delay after each failed attempt.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Speaker role of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// One entry in the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Ordered conversation history replayed to the endpoint on every call.
pub type Transcript = Vec<Turn>;

/// Attempt-count and backoff-timing configuration for retried calls.
/// Immutable for the duration of a call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. At least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied per retry: the wait after attempt `i` (zero-based)
    /// is `initial_delay * backoff_multiplier^i`.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Set the total number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }

    /// Wait to apply after the failed attempt with the given zero-based index.
    fn delay_after(&self, attempt_index: u32) -> Duration {
        self.initial_delay
            .mul_f64(self.backoff_multiplier.powi(attempt_index as i32))
    }
}

/// Owns the running transcript and produces replies from the inference
/// endpoint, masking transient failures from the caller.
///
/// Each instance is an independent conversation. Calls take `&mut self`, so
/// invocations on one fetcher are serialized by construction.
pub struct ResponseFetcher<T> {
    transport: T,
    policy: RetryPolicy,
    transcript: Transcript,
}

impl<T: GenerateTransport> ResponseFetcher<T> {
    /// Create a fetcher with an empty transcript.
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            transcript: Transcript::new(),
        }
    }

    /// Produce a reply for `prompt`, retrying with exponential backoff.
    ///
    /// The user turn is appended to the transcript before the first network
    /// attempt. On success the model turn is appended as well and the reply
    /// returned. Once every attempt has failed, the transcript is cleared —
    /// stale context from a misbehaving endpoint must not leak into the next
    /// exchange — and the fixed apology string is returned. No error ever
    /// crosses this boundary.
    ///
    /// Callers are expected to trim input and reject empty prompts; this
    /// method does not validate.
    pub async fn fetch_reply(&mut self, prompt: &str) -> String {
        self.transcript.push(Turn::user(prompt));

        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 0..max_attempts {
            match self.transport.generate(&self.transcript).await {
                Ok(reply) => {
                    self.transcript.push(Turn::model(reply.clone()));
                    return reply;
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "inference request failed"
                    );
                    if attempt + 1 < max_attempts {
                        sleep(self.policy.delay_after(attempt)).await;
                    }
                }
            }
        }

        warn!("all attempts exhausted, dropping conversation context");
        self.transcript.clear();
        APOLOGY_REPLY.to_string()
    }

    /// Current conversation transcript.
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Discard the conversation history and start clean.
    pub fn reset(&mut self) {
        self.transcript.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::super::client::TransportError;
    use super::*;

    /// Scripted transport: pops one result per call and records every
    /// payload it was handed. Exhausted scripts keep failing.
    #[derive(Clone, Default)]
    struct StubTransport {
        inner: Arc<StubInner>,
    }

    #[derive(Default)]
    struct StubInner {
        script: Mutex<VecDeque<Result<String, String>>>,
        calls: AtomicUsize,
        payloads: Mutex<Vec<Vec<Turn>>>,
    }

    impl StubTransport {
        fn scripted(script: Vec<Result<&str, &str>>) -> Self {
            let stub = Self::default();
            *stub.inner.script.lock().unwrap() = script
                .into_iter()
                .map(|r| r.map(str::to_string).map_err(str::to_string))
                .collect();
            stub
        }

        fn always_failing() -> Self {
            Self::default()
        }

        fn calls(&self) -> usize {
            self.inner.calls.load(Ordering::SeqCst)
        }

        fn payload(&self, index: usize) -> Vec<Turn> {
            self.inner.payloads.lock().unwrap()[index].clone()
        }
    }

    impl GenerateTransport for StubTransport {
        async fn generate(&self, turns: &[Turn]) -> Result<String, TransportError> {
            self.inner.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.payloads.lock().unwrap().push(turns.to_vec());
            match self.inner.script.lock().unwrap().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(msg)) => Err(TransportError::MalformedReply(msg)),
                None => Err(TransportError::Status(503)),
            }
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(max_attempts)
            .with_initial_delay(Duration::from_millis(1000))
            .with_backoff_multiplier(2.0)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let stub = StubTransport::scripted(vec![Ok("Hello! How can I help?")]);
        let mut fetcher = ResponseFetcher::new(stub.clone(), policy(3));

        let reply = fetcher.fetch_reply("hi").await;

        assert_eq!(reply, "Hello! How can I help?");
        assert_eq!(stub.calls(), 1);
        assert_eq!(
            fetcher.transcript(),
            &[Turn::user("hi"), Turn::model("Hello! How can I help?")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_count_is_bounded() {
        let stub = StubTransport::always_failing();
        let mut fetcher = ResponseFetcher::new(stub.clone(), policy(3));

        fetcher.fetch_reply("hi").await;

        assert_eq!(stub.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_grow_exponentially() {
        let stub = StubTransport::always_failing();
        let mut fetcher = ResponseFetcher::new(stub.clone(), policy(3));

        let start = tokio::time::Instant::now();
        fetcher.fetch_reply("hi").await;

        // 1000ms after attempt 1, 2000ms after attempt 2, nothing after the
        // last attempt.
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
        assert_eq!(stub.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_clears_transcript_and_apologizes() {
        let stub = StubTransport::scripted(vec![Ok("fine, thanks")]);
        let mut fetcher = ResponseFetcher::new(stub.clone(), policy(3));

        // Seed the transcript with a completed exchange first.
        fetcher.fetch_reply("how are you?").await;
        assert_eq!(fetcher.transcript().len(), 2);

        let reply = fetcher.fetch_reply("and now?").await;

        assert_eq!(reply, APOLOGY_REPLY);
        assert!(fetcher.transcript().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let stub = StubTransport::scripted(vec![Err("garbled body"), Ok("recovered")]);
        let mut fetcher = ResponseFetcher::new(stub.clone(), policy(3));

        let reply = fetcher.fetch_reply("hi").await;

        assert_eq!(reply, "recovered");
        assert_eq!(stub.calls(), 2);
        // Exactly one completed exchange: no duplicate user turn, no partial
        // model turn.
        assert_eq!(
            fetcher.transcript(),
            &[Turn::user("hi"), Turn::model("recovered")]
        );
    }

    #[tokio::test]
    async fn test_context_accumulates_across_calls() {
        let stub = StubTransport::scripted(vec![Ok("first reply"), Ok("second reply")]);
        let mut fetcher = ResponseFetcher::new(stub.clone(), policy(3));

        fetcher.fetch_reply("one").await;
        fetcher.fetch_reply("two").await;

        assert_eq!(
            fetcher.transcript(),
            &[
                Turn::user("one"),
                Turn::model("first reply"),
                Turn::user("two"),
                Turn::model("second reply"),
            ]
        );
        // The second request carried the whole history plus the new turn.
        assert_eq!(
            stub.payload(1),
            vec![
                Turn::user("one"),
                Turn::model("first reply"),
                Turn::user("two"),
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_discards_history() {
        let stub = StubTransport::scripted(vec![Ok("reply")]);
        let mut fetcher = ResponseFetcher::new(stub, policy(3));

        fetcher.fetch_reply("hi").await;
        fetcher.reset();

        assert!(fetcher.transcript().is_empty());
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(1000));
        assert_eq!(policy.backoff_multiplier, 2.0);
    }
}
