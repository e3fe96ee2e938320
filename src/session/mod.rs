//! Session state: who is signed in, what role they hold, and whether that is
//! known yet.
//!
//! DESIGN
//! ======
//! `Session` is a plain value owned by the resolver task and published through
//! a `watch` channel. All transitions are methods here so the recency rule
//! can be tested without tasks or timing:
//!
//! - `begin` bumps `generation` on every identity change.
//! - `apply_lookup` accepts a profile result only if it carries the current
//!   generation and an identity is still present.
//!
//! A slow lookup for a user who has since signed out (or been replaced) can
//! therefore never write its role into the newer session.

pub mod resolver;

use tokio::sync::watch;

use crate::identity::Identity;
use crate::profile::Profile;
use crate::role::{Capability, Role};

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Pending,
    Resolved,
}

/// Outcome of one profile lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(Profile),
    Missing,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Option<Identity>,
    pub role: Option<Role>,
    pub profile: Option<Profile>,
    pub resolution: Resolution,
    /// Bumped on every identity change; tags in-flight lookups.
    pub generation: u64,
}

/// The tri-state view consumers render from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionView<'a> {
    Loading,
    Unauthenticated,
    Authenticated { identity: &'a Identity, role: Option<Role> },
}

impl Default for Session {
    /// Before the identity provider's first emission nothing is known.
    fn default() -> Self {
        Self { identity: None, role: None, profile: None, resolution: Resolution::Pending, generation: 0 }
    }
}

impl Session {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution == Resolution::Resolved
    }

    #[must_use]
    pub fn view(&self) -> SessionView<'_> {
        match (self.resolution, &self.identity) {
            (Resolution::Pending, _) => SessionView::Loading,
            (Resolution::Resolved, None) => SessionView::Unauthenticated,
            (Resolution::Resolved, Some(identity)) => SessionView::Authenticated { identity, role: self.role },
        }
    }

    /// Whether the signed-in user may use `capability`. False while loading.
    #[must_use]
    pub fn can(&self, capability: Capability) -> bool {
        self.is_resolved() && self.identity.is_some() && capability.permits(self.role)
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.identity.as_ref().map(|id| id.uid.as_str())
    }

    /// Start a new identity epoch and return its generation. A present
    /// identity leaves the session pending until its lookup is applied.
    pub(crate) fn begin(&mut self, identity: Option<Identity>) -> u64 {
        self.generation += 1;
        self.role = None;
        self.profile = None;
        self.resolution = if identity.is_some() { Resolution::Pending } else { Resolution::Resolved };
        self.identity = identity;
        self.generation
    }

    /// Apply a lookup issued under `generation`. Returns `false` and leaves
    /// the session untouched when the lookup is stale.
    pub(crate) fn apply_lookup(&mut self, generation: u64, outcome: LookupOutcome) -> bool {
        if generation != self.generation || self.identity.is_none() {
            return false;
        }
        match outcome {
            LookupOutcome::Found(profile) => {
                self.role = profile.role;
                self.profile = Some(profile);
            }
            LookupOutcome::Missing | LookupOutcome::Failed => {
                self.role = None;
                self.profile = None;
            }
        }
        self.resolution = Resolution::Resolved;
        true
    }
}

// =============================================================================
// SESSION HANDLE
// =============================================================================

/// Owns the task guard of a running resolver; aborts it when the last
/// handle is dropped.
struct TaskGuard(tokio::task::JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Read side of the session, passed explicitly to whatever needs it.
#[derive(Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Session>,
    _task: Option<std::sync::Arc<TaskGuard>>,
}

impl SessionHandle {
    /// Wrap a session channel driven by something other than
    /// [`resolver::SessionResolver`].
    #[must_use]
    pub fn from_receiver(rx: watch::Receiver<Session>) -> Self {
        Self { rx, _task: None }
    }

    pub(crate) fn with_task(rx: watch::Receiver<Session>, task: tokio::task::JoinHandle<()>) -> Self {
        Self { rx, _task: Some(std::sync::Arc::new(TaskGuard(task))) }
    }

    #[must_use]
    pub fn current(&self) -> Session {
        self.rx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.rx.clone()
    }

    /// Wait until the session is resolved and return it. If the resolver has
    /// stopped, returns the last published session.
    pub async fn resolved(&self) -> Session {
        let mut rx = self.rx.clone();
        match rx.wait_for(Session::is_resolved).await {
            Ok(session) => session.clone(),
            Err(_) => self.current(),
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
