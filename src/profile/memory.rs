//! In-process profile store with live change notification.
//!
//! Each uid owns a `watch` channel, so `watch_profile` subscribers see every
//! later `put_profile` / `remove` without polling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::{Profile, ProfileStore, ProfileStream, StoreError};

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, watch::Sender<Option<Profile>>>>,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete the profile under `uid`, notifying live subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn remove(&self, uid: &str) -> Result<(), StoreError> {
        let profiles = self.profiles.lock().map_err(|e| StoreError::Request(e.to_string()))?;
        if let Some(tx) = profiles.get(uid) {
            tx.send_replace(None);
        }
        Ok(())
    }

    fn subscribe(&self, uid: &str) -> Result<watch::Receiver<Option<Profile>>, StoreError> {
        let mut profiles = self.profiles.lock().map_err(|e| StoreError::Request(e.to_string()))?;
        let tx = profiles.entry(uid.to_owned()).or_insert_with(|| watch::channel(None).0);
        Ok(tx.subscribe())
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch_profile(&self, uid: &str) -> Result<Option<Profile>, StoreError> {
        let profiles = self.profiles.lock().map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(profiles.get(uid).and_then(|tx| tx.borrow().clone()))
    }

    async fn put_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut profiles = self.profiles.lock().map_err(|e| StoreError::Request(e.to_string()))?;
        profiles
            .entry(profile.uid.clone())
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(profile.clone()));
        Ok(())
    }

    fn watch_profile(self: Arc<Self>, uid: String) -> ProfileStream {
        let rx = match self.subscribe(&uid) {
            Ok(rx) => rx,
            Err(e) => return Box::pin(futures::stream::once(async move { Err(e) })),
        };
        Box::pin(futures::stream::unfold((rx, true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let snapshot = rx.borrow_and_update().clone();
            Some((Ok(snapshot), (rx, false)))
        }))
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
