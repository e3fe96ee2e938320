//! Sign-in, registration, and sign-out flows.
//!
//! SYSTEM CONTEXT
//! ==============
//! The login and signup views call into this module. Signing in goes through
//! the identity provider, then reads the profile once to pick where the user
//! lands. The session resolver picks the new identity up independently from
//! the provider's channel; nothing here writes session state.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::identity::{AuthError, FederatedCredential, Identity, IdentityProvider};
use crate::profile::{Profile, ProfileStore, StoreError};
use crate::role::Role;
use crate::routes::authorizer::permits;
use crate::routes::{Guard, Resolved, RouteTable};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no profile found for user {0}")]
    ProfileNotFound(String),
    #[error("profile for user {0} has no recognised role")]
    UnknownRole(String),
}

/// A completed sign-in and where to send the user next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignIn {
    pub identity: Identity,
    pub role: Role,
    pub destination: String,
}

/// Trim, lowercase, and require exactly one `@` with text on both sides.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

pub struct Accounts {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    table: RouteTable,
}

impl Accounts {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn ProfileStore>) -> Self {
        Self { provider, store, table: RouteTable::clinic() }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail` for a malformed address, `Auth` when the
    /// provider rejects the credentials, and `ProfileNotFound` /
    /// `UnknownRole` when the user has no usable profile. In the last two
    /// cases the identity stays signed in.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
        return_to: Option<&str>,
    ) -> Result<SignIn, AccountError> {
        let email = normalize_email(email).ok_or(AccountError::InvalidEmail)?;
        let identity = self.provider.sign_in_with_password(&email, password).await?;
        self.complete(identity, return_to).await
    }

    /// Sign in with a credential from an external provider.
    ///
    /// # Errors
    ///
    /// Same as [`Self::sign_in_with_password`], minus email validation.
    pub async fn sign_in_federated(
        &self,
        credential: &FederatedCredential,
        return_to: Option<&str>,
    ) -> Result<SignIn, AccountError> {
        let identity = self.provider.sign_in_federated(credential).await?;
        self.complete(identity, return_to).await
    }

    /// Create an account and its profile document, leaving the new user
    /// signed in.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail` / `WeakPassword` before contacting the
    /// provider, `Auth` when sign-up fails, and `Store` when the profile
    /// cannot be written.
    pub async fn register(&self, email: &str, password: &str, role: Role) -> Result<SignIn, AccountError> {
        let email = normalize_email(email).ok_or(AccountError::InvalidEmail)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::WeakPassword { min: MIN_PASSWORD_LEN });
        }

        let identity = self.provider.sign_up(&email, password).await?;
        let profile = Profile::new(identity.uid.clone(), role).with_email(email.clone());
        if let Err(e) = self.store.put_profile(&profile).await {
            error!(uid = %identity.uid, error = %e, "profile write failed after sign-up");
            return Err(e.into());
        }

        info!(uid = %identity.uid, %role, "account registered");

        // Sign-up published the identity before the profile existed; signing
        // in again makes the resolver look the profile up once more.
        let identity = self.provider.sign_in_with_password(&email, password).await?;
        let destination = role.home_path(&identity.uid);
        Ok(SignIn { identity, role, destination })
    }

    /// # Errors
    ///
    /// Returns `Auth` if the provider fails to sign out.
    pub async fn sign_out(&self) -> Result<(), AccountError> {
        self.provider.sign_out().await?;
        Ok(())
    }

    async fn complete(&self, identity: Identity, return_to: Option<&str>) -> Result<SignIn, AccountError> {
        let Some(profile) = self.store.fetch_profile(&identity.uid).await? else {
            warn!(uid = %identity.uid, "signed in without a profile");
            return Err(AccountError::ProfileNotFound(identity.uid));
        };
        let Some(role) = profile.role else {
            warn!(uid = %identity.uid, "signed in with an unrecognised role");
            return Err(AccountError::UnknownRole(identity.uid));
        };

        let destination = self.destination(role, &identity.uid, return_to);
        info!(uid = %identity.uid, %role, %destination, "signed in");
        Ok(SignIn { identity, role, destination })
    }

    /// The preserved path when it names a protected route the role may open,
    /// else the role's home.
    fn destination(&self, role: Role, uid: &str, return_to: Option<&str>) -> String {
        let preserved = return_to.and_then(|path| match self.table.resolve(path) {
            Resolved::Matched(target)
                if target.route.guard != Guard::Public && permits(target.route.guard, Some(role)) =>
            {
                Some(target.path)
            }
            Resolved::Matched(_) | Resolved::Unknown { .. } => None,
        });
        preserved.unwrap_or_else(|| role.home_path(uid))
    }
}

#[cfg(test)]
#[path = "accounts_test.rs"]
mod tests;
