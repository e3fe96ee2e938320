//! Clinic configuration parsed from environment variables.

use std::time::Duration;

use crate::identity::rest::DEFAULT_AUTH_BASE_URL;
use crate::profile::firestore::DEFAULT_STORE_BASE_URL;
use crate::routes::authorizer::{DEFAULT_LANDING_PATH, DEFAULT_LOGIN_PATH};
use crate::routes::{Guard, Resolved, RouteTable};
use crate::session::resolver::{ProfileMode, ResolverOptions};

pub const DEFAULT_PROFILE_COLLECTION: &str = "users";
pub const DEFAULT_PROFILE_POLL_SECS: u64 = 15;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityBackend {
    Memory,
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileBackend {
    Memory,
    Firestore,
    Postgres,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is required")]
    Missing { var: &'static str },
    #[error("invalid {var}: '{value}' (expected {expected})")]
    Invalid { var: &'static str, value: String, expected: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicConfig {
    pub identity_backend: IdentityBackend,
    pub profile_backend: ProfileBackend,
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub auth_base_url: String,
    pub store_base_url: String,
    pub profile_collection: String,
    pub profile_mode: ProfileMode,
    pub poll_interval: Duration,
    pub lookup_timeout: Option<Duration>,
    pub login_path: String,
    pub landing_path: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

impl ClinicConfig {
    /// Build typed config from environment variables.
    ///
    /// Backends:
    /// - `CLINIC_IDENTITY_BACKEND`: `memory` (default) or `rest`
    /// - `CLINIC_PROFILE_BACKEND`: `memory` (default), `firestore`, or `postgres`
    ///
    /// Required per backend:
    /// - `CLINIC_API_KEY` for `rest` and `firestore`
    /// - `CLINIC_PROJECT_ID` for `firestore`
    /// - `DATABASE_URL` for `postgres`
    ///
    /// Optional:
    /// - `CLINIC_AUTH_BASE_URL`, `CLINIC_STORE_BASE_URL`: REST endpoints
    /// - `CLINIC_PROFILE_COLLECTION`: default `users`
    /// - `CLINIC_PROFILE_MODE`: `once` (default) or `live`
    /// - `CLINIC_PROFILE_POLL_SECS`: default 15
    /// - `CLINIC_PROFILE_TIMEOUT_SECS`: unset means no timeout
    /// - `CLINIC_LOGIN_PATH`: default `/login`; must be a public clinic route
    /// - `CLINIC_LANDING_PATH`: default `/`; must be a clinic route
    /// - `DB_MAX_CONNECTIONS`: default 5
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown backend or mode, a missing required
    /// variable, or a login or landing path the clinic route table cannot
    /// serve.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let identity_backend = parse_identity_backend(var("CLINIC_IDENTITY_BACKEND").as_deref())?;
        let profile_backend = parse_profile_backend(var("CLINIC_PROFILE_BACKEND").as_deref())?;
        let api_key = var("CLINIC_API_KEY");
        let project_id = var("CLINIC_PROJECT_ID");
        let database_url = var("DATABASE_URL");

        if api_key.is_none()
            && (identity_backend == IdentityBackend::Rest || profile_backend == ProfileBackend::Firestore)
        {
            return Err(ConfigError::Missing { var: "CLINIC_API_KEY" });
        }
        if project_id.is_none() && profile_backend == ProfileBackend::Firestore {
            return Err(ConfigError::Missing { var: "CLINIC_PROJECT_ID" });
        }
        if database_url.is_none() && profile_backend == ProfileBackend::Postgres {
            return Err(ConfigError::Missing { var: "DATABASE_URL" });
        }

        let poll_secs = parse_u64(var("CLINIC_PROFILE_POLL_SECS").as_deref())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_PROFILE_POLL_SECS);
        let lookup_timeout =
            parse_u64(var("CLINIC_PROFILE_TIMEOUT_SECS").as_deref()).filter(|secs| *secs > 0).map(Duration::from_secs);

        Ok(Self {
            identity_backend,
            profile_backend,
            api_key,
            project_id,
            auth_base_url: base_url(var("CLINIC_AUTH_BASE_URL"), DEFAULT_AUTH_BASE_URL),
            store_base_url: base_url(var("CLINIC_STORE_BASE_URL"), DEFAULT_STORE_BASE_URL),
            profile_collection: var("CLINIC_PROFILE_COLLECTION")
                .unwrap_or_else(|| DEFAULT_PROFILE_COLLECTION.to_owned()),
            profile_mode: parse_profile_mode(var("CLINIC_PROFILE_MODE").as_deref())?,
            poll_interval: Duration::from_secs(poll_secs),
            lookup_timeout,
            login_path: route_path("CLINIC_LOGIN_PATH", var("CLINIC_LOGIN_PATH"), DEFAULT_LOGIN_PATH, true)?,
            landing_path: route_path("CLINIC_LANDING_PATH", var("CLINIC_LANDING_PATH"), DEFAULT_LANDING_PATH, false)?,
            database_url,
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        })
    }

    #[must_use]
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions { mode: self.profile_mode, lookup_timeout: self.lookup_timeout }
    }
}

fn parse_u64(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|v| v.parse::<u64>().ok())
}

fn base_url(raw: Option<String>, default: &str) -> String {
    raw.as_deref().unwrap_or(default).trim_end_matches('/').to_owned()
}

/// Login must land on a public route or the login redirect never settles.
fn route_path(
    var: &'static str,
    raw: Option<String>,
    default: &str,
    public: bool,
) -> Result<String, ConfigError> {
    let Some(path) = raw else {
        return Ok(default.to_owned());
    };
    if !path.starts_with('/') {
        return Err(ConfigError::Invalid { var, value: path, expected: "a path starting with '/'" });
    }
    match RouteTable::clinic().resolve(&path) {
        Resolved::Matched(target) if !public || target.route.guard == Guard::Public => Ok(path),
        Resolved::Matched(_) => Err(ConfigError::Invalid { var, value: path, expected: "a public clinic route" }),
        Resolved::Unknown { .. } => Err(ConfigError::Invalid { var, value: path, expected: "a clinic route" }),
    }
}

fn parse_identity_backend(raw: Option<&str>) -> Result<IdentityBackend, ConfigError> {
    match raw.unwrap_or("memory") {
        "memory" => Ok(IdentityBackend::Memory),
        "rest" => Ok(IdentityBackend::Rest),
        other => Err(ConfigError::Invalid {
            var: "CLINIC_IDENTITY_BACKEND",
            value: other.to_owned(),
            expected: "'memory' or 'rest'",
        }),
    }
}

fn parse_profile_backend(raw: Option<&str>) -> Result<ProfileBackend, ConfigError> {
    match raw.unwrap_or("memory") {
        "memory" => Ok(ProfileBackend::Memory),
        "firestore" => Ok(ProfileBackend::Firestore),
        "postgres" => Ok(ProfileBackend::Postgres),
        other => Err(ConfigError::Invalid {
            var: "CLINIC_PROFILE_BACKEND",
            value: other.to_owned(),
            expected: "'memory', 'firestore', or 'postgres'",
        }),
    }
}

fn parse_profile_mode(raw: Option<&str>) -> Result<ProfileMode, ConfigError> {
    match raw.unwrap_or("once") {
        "once" => Ok(ProfileMode::Once),
        "live" => Ok(ProfileMode::Live),
        other => Err(ConfigError::Invalid {
            var: "CLINIC_PROFILE_MODE",
            value: other.to_owned(),
            expected: "'once' or 'live'",
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
