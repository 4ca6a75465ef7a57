//! REST client for the managed identity service.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth provider rejected the request: {0}")]
    Provider(String),
    #[error("malformed auth response: {0}")]
    Malformed(String),
}

impl AuthError {
    /// Message suitable for showing next to the login/signup form.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Provider(code) => provider_message(code),
            _ => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

/// Map a provider error code to a user-facing message. Codes sometimes carry
/// a detail suffix (`"WEAK_PASSWORD : Password should be ..."`), so match on
/// the prefix.
fn provider_message(code: &str) -> String {
    let known = [
        (
            "EMAIL_EXISTS",
            "This email address is already in use. Try logging in or use a different email.",
        ),
        ("INVALID_EMAIL", "The email address is not valid."),
        ("USER_DISABLED", "This account has been disabled."),
        (
            "EMAIL_NOT_FOUND",
            "No user found with this email. Please check your email or sign up.",
        ),
        (
            "INVALID_PASSWORD",
            "Incorrect email or password. Please try again.",
        ),
        (
            "INVALID_LOGIN_CREDENTIALS",
            "Incorrect email or password. Please try again.",
        ),
        ("MISSING_PASSWORD", "Please enter your password."),
        (
            "WEAK_PASSWORD",
            "The password is too weak. Please choose a password with at least 6 characters.",
        ),
        (
            "OPERATION_NOT_ALLOWED",
            "Email/password accounts are not enabled. Please contact support.",
        ),
        (
            "TOO_MANY_ATTEMPTS_TRY_LATER",
            "Too many failed login attempts. Please try again later.",
        ),
    ];

    for (prefix, message) in known {
        if code.starts_with(prefix) {
            return message.to_string();
        }
    }
    format!("Authentication failed: {code}")
}

/// A signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: String,
    pub id_token: String,
    pub email: Option<String>,
    pub is_anonymous: bool,
}

/// Configuration for the identity service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub base_url: String,
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            api_key: String::new(),
        }
    }
}

impl AuthConfig {
    /// Create a new AuthConfig with custom base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a new AuthConfig with custom API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    #[serde(rename = "localId")]
    local_id: String,
    #[serde(rename = "idToken")]
    id_token: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for the identity service `accounts:*` endpoints.
pub struct AuthClient {
    config: AuthConfig,
    client: Client,
}

impl AuthClient {
    /// Create a new AuthClient with the given configuration.
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Create a new account with email and password.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.post(
            "signUp",
            json!({ "email": email, "password": password, "returnSecureToken": true }),
            false,
        )
        .await
    }

    /// Sign in to an existing account with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.post(
            "signInWithPassword",
            json!({ "email": email, "password": password, "returnSecureToken": true }),
            false,
        )
        .await
    }

    /// Sign in anonymously, creating a throwaway identity.
    pub async fn sign_in_anonymous(&self) -> Result<AuthSession, AuthError> {
        self.post("signUp", json!({ "returnSecureToken": true }), true)
            .await
    }

    /// Sign in with a pre-issued custom token.
    pub async fn sign_in_with_token(&self, token: &str) -> Result<AuthSession, AuthError> {
        self.post(
            "signInWithCustomToken",
            json!({ "token": token, "returnSecureToken": true }),
            false,
        )
        .await
    }

    async fn post(
        &self,
        endpoint: &str,
        body: Value,
        is_anonymous: bool,
    ) -> Result<AuthSession, AuthError> {
        let url = format!(
            "{}/accounts:{}?key={}",
            self.config.base_url, endpoint, self.config.api_key
        );

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => Err(AuthError::Provider(body.error.message)),
                Err(_) => Err(AuthError::Malformed(format!(
                    "status {status} with unrecognized error body"
                ))),
            };
        }

        let body: SignInResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;

        Ok(AuthSession {
            user_id: body.local_id,
            id_token: body.id_token,
            email: body.email,
            is_anonymous,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_message_mapping() {
        assert_eq!(
            provider_message("EMAIL_NOT_FOUND"),
            "No user found with this email. Please check your email or sign up."
        );
        assert_eq!(
            provider_message("INVALID_LOGIN_CREDENTIALS"),
            "Incorrect email or password. Please try again."
        );
        // Codes with a detail suffix still match.
        assert_eq!(
            provider_message("WEAK_PASSWORD : Password should be at least 6 characters"),
            "The password is too weak. Please choose a password with at least 6 characters."
        );
    }

    #[test]
    fn test_provider_message_fallback() {
        assert_eq!(
            provider_message("SOMETHING_NEW"),
            "Authentication failed: SOMETHING_NEW"
        );
    }

    #[test]
    fn test_error_body_parsing() {
        let text = r#"{"error": {"code": 400, "message": "EMAIL_EXISTS"}}"#;
        let body: ErrorBody = serde_json::from_str(text).unwrap();
        assert_eq!(body.error.message, "EMAIL_EXISTS");

        let err = AuthError::Provider(body.error.message);
        assert_eq!(
            err.user_message(),
            "This email address is already in use. Try logging in or use a different email."
        );
    }

    #[test]
    fn test_sign_in_response_parsing() {
        let text = r#"{"localId": "u1", "idToken": "t1", "email": "a@b.c", "refreshToken": "r1"}"#;
        let body: SignInResponse = serde_json::from_str(text).unwrap();
        assert_eq!(body.local_id, "u1");
        assert_eq!(body.id_token, "t1");
        assert_eq!(body.email.as_deref(), Some("a@b.c"));
    }
}
