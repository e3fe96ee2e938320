//! Session resolver: identity stream in, resolved session out.
//!
//! ARCHITECTURE
//! ============
//! `observe` spawns one task that follows the identity provider's channel.
//! Each identity change starts a new generation (see `Session::begin`) and,
//! for a signed-in identity, spawns a lookup task tagged with it. The lookup
//! for the previous generation is aborted, and anything it still manages to
//! publish is rejected by `Session::apply_lookup`.
//!
//! ERROR HANDLING
//! ==============
//! Lookups never surface errors. Not found, store errors, timeouts, and an
//! empty stream all resolve the session with no role, which the route
//! authorizer treats as "no roles satisfied".

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{LookupOutcome, Session, SessionHandle};
use crate::identity::{Identity, IdentityProvider};
use crate::profile::{ProfileStore, ProfileStream, StoreError, fetch_once};

/// How the resolver reads the profile for a signed-in identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileMode {
    /// One fetch per identity change.
    #[default]
    Once,
    /// Follow the profile for as long as the identity stays signed in.
    Live,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverOptions {
    pub mode: ProfileMode,
    /// Bound on the first profile snapshot. `None` waits indefinitely.
    pub lookup_timeout: Option<Duration>,
}

pub struct SessionResolver {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    options: ResolverOptions,
}

impl SessionResolver {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn ProfileStore>, options: ResolverOptions) -> Self {
        Self { provider, store, options }
    }

    /// Subscribe to identity changes and start resolving sessions.
    ///
    /// The returned handle starts in `Loading` and is the only way to read
    /// the session; the resolver task stops when the last handle is dropped
    /// or the identity provider goes away.
    #[must_use]
    pub fn observe(&self) -> SessionHandle {
        let (tx, rx) = watch::channel(Session::default());
        let identities = self.provider.subscribe();
        let task = tokio::spawn(follow_identities(identities, Arc::clone(&self.store), self.options, Arc::new(tx)));
        SessionHandle::with_task(rx, task)
    }
}

enum Transition {
    Unchanged,
    SignedOut,
    Lookup { generation: u64, uid: String },
}

async fn follow_identities(
    mut identities: watch::Receiver<Option<Identity>>,
    store: Arc<dyn ProfileStore>,
    options: ResolverOptions,
    tx: Arc<watch::Sender<Session>>,
) {
    let mut lookup: Option<JoinHandle<()>> = None;

    loop {
        let identity = identities.borrow_and_update().clone();
        match transition(&tx, identity) {
            Transition::Unchanged => {}
            Transition::SignedOut => {
                if let Some(previous) = lookup.take() {
                    previous.abort();
                }
            }
            Transition::Lookup { generation, uid } => {
                if let Some(previous) = lookup.take() {
                    previous.abort();
                }
                let stream = match options.mode {
                    ProfileMode::Once => fetch_once(Arc::clone(&store), uid.clone()),
                    ProfileMode::Live => Arc::clone(&store).watch_profile(uid.clone()),
                };
                lookup = Some(tokio::spawn(run_lookup(stream, uid, generation, options.lookup_timeout, Arc::clone(&tx))));
            }
        }

        if identities.changed().await.is_err() {
            debug!("identity provider closed; session resolver stopping");
            break;
        }
    }

    if let Some(previous) = lookup {
        previous.abort();
    }
}

/// Fold one identity emission into the session.
fn transition(tx: &watch::Sender<Session>, identity: Option<Identity>) -> Transition {
    let mut outcome = Transition::Unchanged;
    tx.send_if_modified(|session| {
        let same_user = matches!(
            (&identity, &session.identity),
            (Some(next), Some(current)) if next.uid == current.uid
        );
        // Same user re-emitted (token refresh): keep the resolved role. A
        // failed lookup is retried instead.
        if same_user && session.profile.is_some() {
            session.identity = identity;
            return true;
        }
        if identity.is_none() && session.identity.is_none() && session.is_resolved() {
            return false;
        }

        let uid = identity.as_ref().map(|id| id.uid.clone());
        let generation = session.begin(identity);
        outcome = match uid {
            Some(uid) => {
                info!(%uid, generation, "resolving session profile");
                Transition::Lookup { generation, uid }
            }
            None => {
                info!(generation, "session signed out");
                Transition::SignedOut
            }
        };
        true
    });
    outcome
}

async fn next_snapshot(
    stream: &mut ProfileStream,
    limit: Option<Duration>,
) -> Option<Result<Option<crate::profile::Profile>, StoreError>> {
    match limit {
        None => stream.next().await,
        Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
            Ok(item) => item,
            Err(_) => Some(Err(StoreError::Timeout(limit))),
        },
    }
}

async fn run_lookup(
    mut stream: ProfileStream,
    uid: String,
    generation: u64,
    timeout: Option<Duration>,
    tx: Arc<watch::Sender<Session>>,
) {
    let mut delivered = false;

    loop {
        let limit = if delivered { None } else { timeout };
        let (outcome, last) = match next_snapshot(&mut stream, limit).await {
            Some(Ok(Some(profile))) => {
                if profile.role.is_none() {
                    warn!(%uid, "profile has no recognised role");
                }
                (LookupOutcome::Found(profile), false)
            }
            Some(Ok(None)) => {
                warn!(%uid, "profile not found");
                (LookupOutcome::Missing, false)
            }
            Some(Err(e)) => {
                error!(%uid, error = %e, "profile lookup failed");
                (LookupOutcome::Failed, false)
            }
            None if delivered => break,
            None => {
                warn!(%uid, "profile stream ended without a snapshot");
                (LookupOutcome::Failed, true)
            }
        };
        delivered = true;

        if !tx.send_if_modified(|session| session.apply_lookup(generation, outcome)) {
            debug!(%uid, generation, "discarding stale profile lookup");
            break;
        }
        if last {
            break;
        }
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
