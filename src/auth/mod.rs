//! Authentication module: identity-service client and auth state stream.

mod client;
mod watcher;

pub use client::{AuthClient, AuthConfig, AuthError, AuthSession};
pub use watcher::AuthWatcher;
