//! REST identity provider speaking the Identity Toolkit `accounts:*` API.
//!
//! Thin HTTP wrapper; response parsing lives in `parse_auth_response` so it
//! can be tested without a network. Sign-out is local: the backend keeps no
//! server-side session for ID tokens, so dropping the identity is enough.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::{AuthError, FederatedCredential, Identity, IdentityHub, IdentityProvider};

pub const DEFAULT_AUTH_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// CLIENT
// =============================================================================

pub struct RestIdentityProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    hub: IdentityHub,
}

impl RestIdentityProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: String, base_url: &str) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, base_url: base_url.trim_end_matches('/').to_owned(), hub: IdentityHub::new() })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{method}?key={}", self.base_url, urlencoding::encode(&self.api_key))
    }

    async fn call<B: Serialize + Sync>(&self, method: &str, body: &B) -> Result<Identity, AuthError> {
        let response = self
            .http
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| AuthError::Request(e.to_string()))?;
        let identity = parse_auth_response(status, &text)?;
        self.hub.publish(Some(identity.clone()));
        Ok(identity)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_auth_response(status: u16, body: &str) -> Result<Identity, AuthError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_owned());
        return Err(classify_error(status, message));
    }
    let parsed: AuthResponse = serde_json::from_str(body).map_err(|e| AuthError::Parse(e.to_string()))?;
    let email = parsed.email.filter(|e| !e.is_empty());
    Ok(Identity { uid: parsed.local_id, email, id_token: parsed.id_token })
}

fn classify_error(status: u16, message: String) -> AuthError {
    // Messages may carry a suffix, e.g. "WEAK_PASSWORD : Password should be ...".
    let code = message.split([' ', ':']).next().unwrap_or_default();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED"
        | "INVALID_IDP_RESPONSE" => AuthError::InvalidCredentials,
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "OPERATION_NOT_ALLOWED" => AuthError::UnsupportedProvider(message),
        _ => AuthError::Api { status, message },
    }
}

fn idp_post_body(credential: &FederatedCredential) -> String {
    format!(
        "id_token={}&providerId={}",
        urlencoding::encode(&credential.id_token),
        urlencoding::encode(&credential.provider_id)
    )
}

#[async_trait::async_trait]
impl IdentityProvider for RestIdentityProvider {
    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.hub.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let body = PasswordRequest { email, password, return_secure_token: true };
        self.call("signInWithPassword", &body).await
    }

    async fn sign_in_federated(&self, credential: &FederatedCredential) -> Result<Identity, AuthError> {
        let body = IdpRequest {
            post_body: idp_post_body(credential),
            request_uri: &credential.request_uri,
            return_secure_token: true,
            return_idp_credential: true,
        };
        self.call("signInWithIdp", &body).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let body = PasswordRequest { email, password, return_secure_token: true };
        self.call("signUp", &body).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.hub.publish(None);
        Ok(())
    }
}

#[cfg(test)]
#[path = "rest_test.rs"]
mod tests;
