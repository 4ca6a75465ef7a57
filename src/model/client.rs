//! HTTP transport for the generative-language inference API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fetcher::{Role, Turn};

/// Transport-level failures. All of them are retryable: the fetcher treats a
/// bad status and a malformed body identically.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("inference endpoint returned status {0}")]
    Status(u16),
    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

/// Configuration for the inference endpoint.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            model_name: "gemini-2.5-flash-preview-05-20".to_string(),
        }
    }
}

impl GeminiConfig {
    /// Create a new GeminiConfig with custom base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a new GeminiConfig with custom API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Create a new GeminiConfig with custom model name.
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }
}

/// Seam between the retrying fetcher and the wire. Production code uses
/// [`GeminiClient`]; tests script their own implementations.
pub trait GenerateTransport {
    /// Send the full transcript, in order, and return the reply text.
    fn generate(
        &self,
        turns: &[Turn],
    ) -> impl std::future::Future<Output = Result<String, TransportError>> + Send;
}

/// Request/response structures for the `generateContent` API.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Extract the reply text: first candidate, first text part.
    fn reply_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

fn build_request(turns: &[Turn]) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: turns
            .iter()
            .map(|turn| Content {
                role: match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                },
                parts: vec![Part { text: &turn.text }],
            })
            .collect(),
    }
}

/// Client for the generative-language inference endpoint.
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    /// Create a new GeminiClient with the given configuration.
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Create a new GeminiClient with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(GeminiConfig::default())
    }
}

impl GenerateTransport for GeminiClient {
    async fn generate(&self, turns: &[Turn]) -> Result<String, TransportError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model_name, self.config.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&build_request(turns))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedReply(e.to_string()))?;

        body.reply_text().ok_or_else(|| {
            TransportError::MalformedReply("no candidate text in response".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let turns = vec![
            Turn::user("hello"),
            Turn::model("hi there"),
            Turn::user("how are you?"),
        ];
        let value = serde_json::to_value(build_request(&turns)).unwrap();

        let contents = value["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "hello");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "how are you?");
    }

    #[test]
    fn test_reply_text_extraction() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "the reply"}, {"text": "extra"}]}}
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.reply_text().as_deref(), Some("the reply"));
    }

    #[test]
    fn test_reply_text_missing_structure() {
        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.reply_text(), None);

        let no_parts: GenerateResponse =
            serde_json::from_str(r#"{"candidates": [{"content": {"parts": []}}]}"#).unwrap();
        assert_eq!(no_parts.reply_text(), None);

        let no_content: GenerateResponse = serde_json::from_str(r#"{"candidates": [{}]}"#).unwrap();
        assert_eq!(no_content.reply_text(), None);
    }

    #[test]
    fn test_gemini_config_default() {
        let config = GeminiConfig::default();
        assert_eq!(
            config.base_url,
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(config.model_name, "gemini-2.5-flash-preview-05-20");
    }
}
