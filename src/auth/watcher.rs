//! Auth state stream and the sign-in fallback chain.

use tokio::sync::watch;
use tracing::{info, warn};

use super::client::{AuthClient, AuthError, AuthSession};

/// Owns the identity client and broadcasts every identity change over a
/// watch channel: `Some(session)` after a successful sign-in or sign-up,
/// `None` after sign-out. Consumers subscribe once and react to each value
/// instead of polling.
pub struct AuthWatcher {
    client: AuthClient,
    /// Pre-issued custom token, if the environment provides one.
    auth_token: Option<String>,
    state_tx: watch::Sender<Option<AuthSession>>,
}

impl AuthWatcher {
    pub fn new(client: AuthClient, auth_token: Option<String>) -> Self {
        let (state_tx, _) = watch::channel(None);
        Self {
            client,
            auth_token,
            state_tx,
        }
    }

    /// Subscribe to identity changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.state_tx.subscribe()
    }

    /// The currently signed-in identity, if any.
    pub fn current(&self) -> Option<AuthSession> {
        self.state_tx.borrow().clone()
    }

    /// Sign in with email and password and publish the new identity.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let session = self.client.sign_in(email, password).await?;
        info!(user_id = %session.user_id, "signed in");
        self.publish(Some(session.clone()));
        Ok(session)
    }

    /// Create an account and publish the new identity.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let session = self.client.sign_up(email, password).await?;
        info!(user_id = %session.user_id, "signed up");
        self.publish(Some(session.clone()));
        Ok(session)
    }

    /// Drop the current identity and notify subscribers.
    pub fn sign_out(&self) {
        info!("signed out");
        self.publish(None);
    }

    /// Make sure some identity is signed in, using the fallback chain: the
    /// pre-issued token first (when configured), then anonymous sign-in.
    /// An error from both is the caller's cue to fall back to the login
    /// screen.
    pub async fn ensure_signed_in(&self) -> Result<AuthSession, AuthError> {
        if let Some(session) = self.current() {
            return Ok(session);
        }

        if let Some(token) = &self.auth_token {
            match self.client.sign_in_with_token(token).await {
                Ok(session) => {
                    info!(user_id = %session.user_id, "signed in with custom token");
                    self.publish(Some(session.clone()));
                    return Ok(session);
                }
                Err(e) => {
                    warn!(error = %e, "custom token sign-in failed, falling back to anonymous");
                }
            }
        }

        let session = self.client.sign_in_anonymous().await?;
        info!(user_id = %session.user_id, "signed in anonymously");
        self.publish(Some(session.clone()));
        Ok(session)
    }

    fn publish(&self, session: Option<AuthSession>) {
        // send_replace never fails even with no subscribers.
        self.state_tx.send_replace(session);
    }
}
