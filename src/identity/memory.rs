//! In-process identity provider for tests, demos, and local development.
//!
//! Accounts live in a mutex-guarded map keyed by normalized email. Passwords
//! are stored as salted SHA-256 digests so the map never holds plaintext.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tokio::sync::watch;
use uuid::Uuid;

use super::{AuthError, FederatedCredential, Identity, IdentityHub, IdentityProvider, generate_token};
use crate::accounts::normalize_email;

struct Account {
    uid: String,
    email: String,
    password_hash: String,
}

pub struct MemoryIdentityProvider {
    hub: IdentityHub,
    accounts: Mutex<HashMap<String, Account>>,
    /// `(provider_id, subject)` -> uid for federated sign-ins.
    federated: Mutex<HashMap<(String, String), String>>,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self { hub: IdentityHub::new(), accounts: Mutex::new(HashMap::new()), federated: Mutex::new(HashMap::new()) }
    }

    /// Replace the current identity directly, as an external sign-in, a
    /// second tab, or token expiry would.
    pub fn set_current(&self, identity: Option<Identity>) {
        self.hub.publish(identity);
    }

    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.hub.current()
    }

    fn issue(uid: &str, email: Option<String>) -> Identity {
        Identity { uid: uid.to_owned(), email, id_token: generate_token() }
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_password(uid: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uid.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    super::bytes_to_hex(&hasher.finalize())
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.hub.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let key = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
        let identity = {
            let accounts = self.accounts.lock().map_err(|e| AuthError::Request(e.to_string()))?;
            let account = accounts.get(&key).ok_or(AuthError::InvalidCredentials)?;
            if account.password_hash != hash_password(&account.uid, password) {
                return Err(AuthError::InvalidCredentials);
            }
            Self::issue(&account.uid, Some(account.email.clone()))
        };
        self.hub.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_federated(&self, credential: &FederatedCredential) -> Result<Identity, AuthError> {
        if credential.id_token.trim().is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let uid = {
            let mut federated = self.federated.lock().map_err(|e| AuthError::Request(e.to_string()))?;
            federated
                .entry((credential.provider_id.clone(), credential.id_token.clone()))
                .or_insert_with(|| Uuid::new_v4().simple().to_string())
                .clone()
        };
        let identity = Self::issue(&uid, None);
        self.hub.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let key = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
        let identity = {
            let mut accounts = self.accounts.lock().map_err(|e| AuthError::Request(e.to_string()))?;
            if accounts.contains_key(&key) {
                return Err(AuthError::EmailExists);
            }
            let uid = Uuid::new_v4().simple().to_string();
            let password_hash = hash_password(&uid, password);
            accounts.insert(key.clone(), Account { uid: uid.clone(), email: key.clone(), password_hash });
            Self::issue(&uid, Some(key))
        };
        self.hub.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.hub.publish(None);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
