//! Navigation state: the current path, evaluated against the live session.
//!
//! SYSTEM CONTEXT
//! ==============
//! The navigator plays the part of the client router. It resolves a path in
//! the route table, asks the authorizer for a decision, and follows redirects
//! until it reaches something to show. Authorization is re-run on every
//! `navigate` and every session change, so a sign-out while a protected view
//! is mounted redirects immediately.
//!
//! A denial redirect that points back at the path being denied (an unknown
//! role on the landing page itself) ends in `Outcome::Blocked` instead of a
//! redirect loop.

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::routes::authorizer::{Authorizer, Decision};
use crate::routes::{Resolved, RouteDef, RouteTable, normalize_path};
use crate::session::{Session, SessionHandle};

const MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Session still resolving at `path`; nothing has been decided.
    Loading { path: String },
    View { route: &'static RouteDef, path: String, params: BTreeMap<String, String> },
    /// No view is reachable from `path` for this session.
    Blocked { path: String },
}

impl Outcome {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Loading { path } | Self::View { path, .. } | Self::Blocked { path } => path,
        }
    }

    /// Name of the rendered route, if this outcome renders one.
    #[must_use]
    pub fn view_name(&self) -> Option<&'static str> {
        match self {
            Self::View { route, .. } => Some(route.name),
            Self::Loading { .. } | Self::Blocked { .. } => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading { path } => write!(f, "loading {path}"),
            Self::View { route, path, .. } => write!(f, "view {} at {path}", route.name),
            Self::Blocked { path } => write!(f, "blocked at {path}"),
        }
    }
}

pub struct Navigator {
    table: RouteTable,
    authorizer: Authorizer,
    session: SessionHandle,
    rx: watch::Receiver<Session>,
    current: String,
    return_to: Option<String>,
}

impl Navigator {
    #[must_use]
    pub fn new(table: RouteTable, authorizer: Authorizer, session: SessionHandle) -> Self {
        let rx = session.subscribe();
        Self { table, authorizer, session, rx, current: "/".to_owned(), return_to: None }
    }

    /// Path the navigator is currently showing (or waiting on).
    #[must_use]
    pub fn current_path(&self) -> &str {
        &self.current
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Path the user asked for before being sent to login.
    #[must_use]
    pub fn return_to(&self) -> Option<&str> {
        self.return_to.as_deref()
    }

    pub fn take_return_to(&mut self) -> Option<String> {
        self.return_to.take()
    }

    /// Go to `path` and evaluate it against the current session.
    pub fn navigate(&mut self, path: &str) -> Outcome {
        let session = self.rx.borrow_and_update().clone();
        self.evaluate(path, &session)
    }

    /// Re-evaluate the current path against the latest session.
    pub fn refresh(&mut self) -> Outcome {
        let path = self.current.clone();
        self.navigate(&path)
    }

    /// Wait for the next session change and re-evaluate. Returns `None`
    /// once the session source has stopped.
    pub async fn follow_session(&mut self) -> Option<Outcome> {
        self.rx.changed().await.ok()?;
        Some(self.refresh())
    }

    fn evaluate(&mut self, requested: &str, session: &Session) -> Outcome {
        let mut path = normalize_path(requested);
        let mut sent_to_login = false;

        for _ in 0..=MAX_REDIRECTS {
            let target = match self.table.resolve(&path) {
                Resolved::Matched(target) => target,
                Resolved::Unknown { path: unknown, fallback } => {
                    let fallback = normalize_path(fallback);
                    if fallback == unknown {
                        return self.settle(Outcome::Blocked { path: unknown });
                    }
                    debug!(path = %unknown, to = %fallback, "unknown path");
                    path = fallback;
                    continue;
                }
            };

            let next = match self.authorizer.authorize(&target, session) {
                Decision::Loading => return self.settle(Outcome::Loading { path: target.path }),
                Decision::Render => {
                    return self.settle(Outcome::View {
                        route: target.route,
                        path: target.path,
                        params: target.params,
                    });
                }
                Decision::RedirectToLogin { login, from } => {
                    // Later hops must not overwrite the path the user asked for.
                    if !sent_to_login {
                        self.return_to = Some(from);
                        sent_to_login = true;
                    }
                    normalize_path(&login)
                }
                Decision::RedirectToLanding { to } => normalize_path(&to),
            };

            if next == target.path {
                warn!(path = %target.path, "redirect points back at the denied path");
                return self.settle(Outcome::Blocked { path: target.path });
            }
            debug!(from = %target.path, to = %next, "redirect");
            path = next;
        }

        warn!(%path, "too many redirects");
        self.settle(Outcome::Blocked { path })
    }

    fn settle(&mut self, outcome: Outcome) -> Outcome {
        outcome.path().clone_into(&mut self.current);
        outcome
    }
}

#[cfg(test)]
#[path = "navigator_test.rs"]
mod tests;
