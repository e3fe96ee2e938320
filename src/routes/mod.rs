//! Route table and path matching.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every view the clinic client can show is declared once here, together with
//! who may see it. The authorizer and the navigation menu both read the
//! guards from this table; nothing else compares roles against paths.
//!
//! Patterns are `/`-separated segments; a segment starting with `:` captures
//! one path segment as a named parameter. Matching ignores query strings,
//! fragments, and trailing slashes.

pub mod authorizer;

use std::collections::BTreeMap;

use crate::role::Role;

// =============================================================================
// ROUTE DEFINITIONS
// =============================================================================

/// Who may render a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Rendered for anyone, signed in or not.
    Public,
    /// Requires an identity. An empty slice admits any signed-in user,
    /// including one whose role is unknown.
    Roles(&'static [Role]),
}

impl Guard {
    /// Roles admitted by this guard, or `None` when no role restriction
    /// applies.
    #[must_use]
    pub fn allowed_roles(self) -> Option<&'static [Role]> {
        match self {
            Self::Public | Self::Roles(&[]) => None,
            Self::Roles(roles) => Some(roles),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDef {
    pub name: &'static str,
    pub pattern: &'static str,
    pub guard: Guard,
}

const ALL_ROLES: &[Role] = &[Role::Admin, Role::Doctor, Role::Patient];

/// The clinic's views.
pub const CLINIC_ROUTES: &[RouteDef] = &[
    RouteDef { name: "login", pattern: "/login", guard: Guard::Public },
    RouteDef { name: "signup", pattern: "/signup", guard: Guard::Public },
    RouteDef { name: "patients_home", pattern: "/", guard: Guard::Roles(ALL_ROLES) },
    RouteDef { name: "book_appointment", pattern: "/marcar-consulta", guard: Guard::Roles(&[Role::Admin, Role::Patient]) },
    RouteDef { name: "agenda", pattern: "/agenda", guard: Guard::Roles(&[Role::Admin, Role::Doctor]) },
    RouteDef { name: "doctors", pattern: "/medicos", guard: Guard::Roles(&[Role::Admin]) },
    RouteDef { name: "patients", pattern: "/pacientes", guard: Guard::Roles(ALL_ROLES) },
    RouteDef { name: "patient_detail", pattern: "/pacientes/:id", guard: Guard::Roles(ALL_ROLES) },
];

// =============================================================================
// MATCHING
// =============================================================================

/// A resolved request: the route it hit, the normalized path, and any
/// captured parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub route: &'static RouteDef,
    pub path: String,
    pub params: BTreeMap<String, String>,
}

impl RouteMatch {
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Result of looking a path up in a [`RouteTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Matched(RouteMatch),
    /// No route matched; the caller should redirect to `fallback`.
    Unknown { path: String, fallback: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct RouteTable {
    routes: &'static [RouteDef],
    fallback: &'static str,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::clinic()
    }
}

impl RouteTable {
    #[must_use]
    pub const fn new(routes: &'static [RouteDef], fallback: &'static str) -> Self {
        Self { routes, fallback }
    }

    /// The clinic's table; unknown paths fall back to `/`.
    #[must_use]
    pub const fn clinic() -> Self {
        Self::new(CLINIC_ROUTES, "/")
    }

    #[must_use]
    pub fn routes(&self) -> &'static [RouteDef] {
        self.routes
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&'static RouteDef> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Find the first route whose pattern matches `raw_path`.
    #[must_use]
    pub fn resolve(&self, raw_path: &str) -> Resolved {
        let path = normalize_path(raw_path);
        for route in self.routes {
            if let Some(params) = match_pattern(route.pattern, &path) {
                return Resolved::Matched(RouteMatch { route, path, params });
            }
        }
        Resolved::Unknown { path, fallback: self.fallback }
    }
}

/// Strip query string, fragment, and trailing slashes; ensure a leading `/`.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let trimmed = raw[..end].trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

/// Match a normalized path against a pattern, returning captured params.
#[must_use]
pub fn match_pattern(pattern: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let mut pattern_segments = pattern.split('/').filter(|s| !s.is_empty());
    let mut path_segments = path.split('/').filter(|s| !s.is_empty());
    let mut params = BTreeMap::new();

    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return Some(params),
            (Some(expected), Some(actual)) => {
                if let Some(name) = expected.strip_prefix(':') {
                    params.insert(name.to_owned(), actual.to_owned());
                } else if expected != actual {
                    return None;
                }
            }
            _ => return None,
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
