//! Route authorizer: render or redirect, given a route and a session.
//!
//! DESIGN
//! ======
//! `authorize` is a pure function of its inputs. It is called on every
//! navigation and every session change; nothing is cached between calls.
//! Rules, first match wins:
//!
//! 1. Public route: render.
//! 2. Session pending: loading placeholder, never a redirect.
//! 3. No identity: redirect to login, carrying the requested path.
//! 4. Non-empty allow-list without the session's role: redirect to landing.
//!    An unknown role is never a member.
//! 5. Otherwise render.

use tracing::warn;

use super::{Guard, RouteMatch};
use crate::role::Role;
use crate::session::{Session, SessionView};

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_LANDING_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Session still resolving; show a neutral placeholder.
    Loading,
    Render,
    /// `from` is the requested path, for returning after sign-in.
    RedirectToLogin { login: String, from: String },
    RedirectToLanding { to: String },
}

impl Decision {
    /// Redirect target, if this decision is a redirect.
    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::RedirectToLogin { login, .. } => Some(login),
            Self::RedirectToLanding { to } => Some(to),
            Self::Loading | Self::Render => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Authorizer {
    login_path: String,
    landing_path: String,
}

impl Default for Authorizer {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PATH, DEFAULT_LANDING_PATH)
    }
}

impl Authorizer {
    #[must_use]
    pub fn new(login_path: impl Into<String>, landing_path: impl Into<String>) -> Self {
        Self { login_path: login_path.into(), landing_path: landing_path.into() }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    #[must_use]
    pub fn authorize(&self, target: &RouteMatch, session: &Session) -> Decision {
        let guard = target.route.guard;
        if guard == Guard::Public {
            return Decision::Render;
        }

        match session.view() {
            SessionView::Loading => Decision::Loading,
            SessionView::Unauthenticated => {
                Decision::RedirectToLogin { login: self.login_path.clone(), from: target.path.clone() }
            }
            SessionView::Authenticated { identity, role } => {
                if permits(guard, role) {
                    Decision::Render
                } else {
                    warn!(
                        uid = %identity.uid,
                        role = role.map_or("unknown", Role::as_str),
                        path = %target.path,
                        "access denied for role"
                    );
                    Decision::RedirectToLanding { to: self.landing_path.clone() }
                }
            }
        }
    }
}

/// Whether `role` satisfies `guard` for a signed-in user.
#[must_use]
pub fn permits(guard: Guard, role: Option<Role>) -> bool {
    match guard.allowed_roles() {
        None => true,
        Some(allowed) => role.is_some_and(|r| allowed.contains(&r)),
    }
}

#[cfg(test)]
#[path = "authorizer_test.rs"]
mod tests;
