//! Identity provider boundary.
//!
//! ARCHITECTURE
//! ============
//! The clinic never verifies credentials itself. An `IdentityProvider`
//! signs users in and out and publishes "current identity or none" on a
//! `watch` channel, which the session resolver subscribes to. A `watch`
//! channel keeps only the latest value, so a burst of sign-in/sign-out
//! events collapses to the most recent identity.

pub mod memory;
pub mod rest;

use std::fmt;
use std::fmt::Write;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

// =============================================================================
// IDENTITY
// =============================================================================

/// An authenticated principal as issued by the identity provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable unique key; profiles are stored under it.
    pub uid: String,
    pub email: Option<String>,
    /// Bearer token for the document store. Never logged.
    #[serde(skip_serializing)]
    pub id_token: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("id_token", &"<redacted>")
            .finish()
    }
}

/// A credential minted by an external identity provider (e.g. Google).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    /// Provider identifier, e.g. `google.com`.
    pub provider_id: String,
    /// The provider-issued ID token.
    pub id_token: String,
    /// The URI the provider redirected back to.
    pub request_uri: String,
}

impl FederatedCredential {
    #[must_use]
    pub fn google(id_token: impl Into<String>, request_uri: impl Into<String>) -> Self {
        Self { provider_id: "google.com".to_owned(), id_token: id_token.into(), request_uri: request_uri.into() }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailExists,
    #[error("federated provider not supported: {0}")]
    UnsupportedProvider(String),
    #[error("identity request failed: {0}")]
    Request(String),
    #[error("identity api error: status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("identity response parse failed: {0}")]
    Parse(String),
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to identity changes. The receiver starts with the current
    /// identity marked as unseen, so the first `changed()` fires immediately.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_in_federated(&self, credential: &FederatedCredential) -> Result<Identity, AuthError>;

    /// Create an account and sign it in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

// =============================================================================
// IDENTITY HUB
// =============================================================================

/// Owns the identity channel shared by every provider implementation.
pub struct IdentityHub {
    tx: watch::Sender<Option<Identity>>,
}

impl IdentityHub {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        rx
    }

    /// Replace the current identity and notify subscribers.
    pub fn publish(&self, identity: Option<Identity>) {
        match &identity {
            Some(id) => tracing::info!(uid = %id.uid, "identity signed in"),
            None => tracing::info!("identity signed out"),
        }
        self.tx.send_replace(identity);
    }

    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }
}

impl Default for IdentityHub {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a random 32-byte hex token.
#[must_use]
pub(crate) fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
