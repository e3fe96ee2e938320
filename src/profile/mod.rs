//! Profile store boundary.
//!
//! A profile is the document keyed by an identity's uid that carries the
//! user's role. Stores answer "fetch one record by uid" and, optionally,
//! stream changes to that record so a role edit reaches a signed-in user
//! without a fresh sign-in.

pub mod firestore;
pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::role::{Role, lenient_role};

// =============================================================================
// PROFILE
// =============================================================================

/// A user profile record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    /// `None` when the stored role is missing or not a known token.
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Option<Role>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Linked patient record, for patient accounts.
    #[serde(default, alias = "pacienteDocId")]
    pub patient_doc_id: Option<String>,
    /// Linked doctor record, for doctor accounts.
    #[serde(default, alias = "medicoDocId")]
    pub doctor_doc_id: Option<String>,
}

impl Profile {
    #[must_use]
    pub fn new(uid: impl Into<String>, role: Role) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            role: Some(role),
            display_name: None,
            patient_doc_id: None,
            doctor_doc_id: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("profile request failed: {0}")]
    Request(String),
    #[error("profile store error: status {status}")]
    Api { status: u16, body: String },
    #[error("profile document parse failed: {0}")]
    Parse(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("profile lookup timed out after {0:?}")]
    Timeout(Duration),
}

// =============================================================================
// STORE TRAIT
// =============================================================================

pub type ProfileStream = BoxStream<'static, Result<Option<Profile>, StoreError>>;

#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    /// Fetch the profile stored under `uid`. `Ok(None)` means not found.
    async fn fetch_profile(&self, uid: &str) -> Result<Option<Profile>, StoreError>;

    /// Create or replace the profile stored under `profile.uid`.
    async fn put_profile(&self, profile: &Profile) -> Result<(), StoreError>;

    /// Stream snapshots of the profile under `uid`. The default yields a
    /// single fetch; stores with change notification override it.
    fn watch_profile(self: Arc<Self>, uid: String) -> ProfileStream {
        Box::pin(futures::stream::once(async move { self.fetch_profile(&uid).await }))
    }
}

/// Single-fetch stream regardless of the store's live support.
#[must_use]
pub fn fetch_once(store: Arc<dyn ProfileStore>, uid: String) -> ProfileStream {
    Box::pin(futures::stream::once(async move { store.fetch_profile(&uid).await }))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
