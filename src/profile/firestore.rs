//! Document-store profiles over the Firestore REST API.
//!
//! DESIGN
//! ======
//! Profiles live at `{collection}/{uid}`. Documents use Firestore's typed
//! value envelope (`{"stringValue": "admin"}`); `decode_document` flattens it
//! to plain JSON and reuses `Profile`'s serde rules, so legacy field names and
//! unknown role tokens behave the same as in every other store.
//!
//! The REST API has no push channel, so `watch_profile` polls and yields
//! only when the document changed.
//!
//! Requests carry the signed-in user's ID token; the store's security rules
//! decide what that user may read.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::watch;

use super::{Profile, ProfileStore, ProfileStream, StoreError};
use crate::identity::Identity;

pub const DEFAULT_STORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for [`FirestoreProfileStore`].
#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub base_url: String,
    pub project_id: String,
    pub api_key: String,
    pub collection: String,
    pub poll_interval: Duration,
}

pub struct FirestoreProfileStore {
    http: reqwest::Client,
    settings: FirestoreSettings,
    identity: watch::Receiver<Option<Identity>>,
}

impl FirestoreProfileStore {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: FirestoreSettings, identity: watch::Receiver<Option<Identity>>) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, settings, identity })
    }

    fn document_url(&self, uid: &str) -> String {
        document_url(&self.settings, uid)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.identity.borrow().as_ref().map(|id| id.id_token.clone());
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Every caller-supplied piece is percent-encoded; `uid` in particular comes
/// from the identity provider and is opaque.
fn document_url(settings: &FirestoreSettings, uid: &str) -> String {
    format!(
        "{}/projects/{}/databases/(default)/documents/{}/{}?key={}",
        settings.base_url.trim_end_matches('/'),
        urlencoding::encode(&settings.project_id),
        urlencoding::encode(&settings.collection),
        urlencoding::encode(uid),
        urlencoding::encode(&settings.api_key)
    )
}

// =============================================================================
// VALUE ENVELOPE
// =============================================================================

fn decode_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    if let Some(s) = obj.get("stringValue") {
        return s.clone();
    }
    if let Some(b) = obj.get("booleanValue") {
        return b.clone();
    }
    if let Some(i) = obj.get("integerValue") {
        // Integers arrive as decimal strings.
        return i
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map_or_else(|| i.clone(), Value::from);
    }
    if let Some(d) = obj.get("doubleValue") {
        return d.clone();
    }
    if let Some(t) = obj.get("timestampValue") {
        return t.clone();
    }
    if let Some(m) = obj.get("mapValue") {
        return Value::Object(decode_fields(m.get("fields")));
    }
    if let Some(a) = obj.get("arrayValue") {
        let values = a.get("values").and_then(Value::as_array).map(|vs| vs.iter().map(decode_value).collect());
        return Value::Array(values.unwrap_or_default());
    }
    Value::Null
}

fn decode_fields(fields: Option<&Value>) -> Map<String, Value> {
    fields
        .and_then(Value::as_object)
        .map(|f| f.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect())
        .unwrap_or_default()
}

/// Decode a Firestore document body into a `Profile` stored under `uid`.
fn decode_document(uid: &str, body: &str) -> Result<Profile, StoreError> {
    let doc: Value = serde_json::from_str(body).map_err(|e| StoreError::Parse(e.to_string()))?;
    let mut fields = decode_fields(doc.get("fields"));
    // The document key is authoritative; legacy documents spell it `UID`.
    fields.remove("UID");
    fields.insert("uid".to_owned(), Value::String(uid.to_owned()));
    serde_json::from_value(Value::Object(fields)).map_err(|e| StoreError::Parse(e.to_string()))
}

fn encode_document(profile: &Profile) -> Result<Value, StoreError> {
    let plain = serde_json::to_value(profile).map_err(|e| StoreError::Parse(e.to_string()))?;
    let mut fields = Map::new();
    if let Value::Object(obj) = plain {
        for (key, value) in obj {
            if let Value::String(s) = value {
                fields.insert(key, serde_json::json!({ "stringValue": s }));
            }
        }
    }
    Ok(serde_json::json!({ "fields": fields }))
}

// =============================================================================
// STORE
// =============================================================================

#[async_trait::async_trait]
impl ProfileStore for FirestoreProfileStore {
    async fn fetch_profile(&self, uid: &str) -> Result<Option<Profile>, StoreError> {
        let response = self
            .authorized(self.http.get(self.document_url(uid)))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| StoreError::Request(e.to_string()))?;
        match status {
            200 => decode_document(uid, &text).map(Some),
            404 => Ok(None),
            _ => Err(StoreError::Api { status, body: text }),
        }
    }

    async fn put_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let body = encode_document(profile)?;
        let response = self
            .authorized(self.http.patch(self.document_url(&profile.uid)))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status, body: text });
        }
        Ok(())
    }

    fn watch_profile(self: Arc<Self>, uid: String) -> ProfileStream {
        struct Poll {
            store: Arc<FirestoreProfileStore>,
            uid: String,
            last: Option<Option<Profile>>,
            started: bool,
        }

        let initial = Poll { store: self, uid, last: None, started: false };
        Box::pin(futures::stream::unfold(initial, |mut poll| async move {
            loop {
                if poll.started {
                    tokio::time::sleep(poll.store.settings.poll_interval).await;
                }
                poll.started = true;
                let fetched = poll.store.fetch_profile(&poll.uid).await;
                if let Some(item) = next_change(&mut poll.last, fetched) {
                    return Some((item, poll));
                }
            }
        }))
    }
}

/// Decide whether a poll result is worth yielding. Unchanged snapshots are
/// swallowed; an error clears `last` so the next success is always yielded.
fn next_change(
    last: &mut Option<Option<Profile>>,
    fetched: Result<Option<Profile>, StoreError>,
) -> Option<Result<Option<Profile>, StoreError>> {
    match fetched {
        Ok(profile) if last.as_ref() == Some(&profile) => None,
        Ok(profile) => {
            *last = Some(profile.clone());
            Some(Ok(profile))
        }
        Err(e) => {
            *last = None;
            Some(Err(e))
        }
    }
}

#[cfg(test)]
#[path = "firestore_test.rs"]
mod tests;
