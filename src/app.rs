//! Composition root.
//!
//! DESIGN
//! ======
//! `Clinic` owns the identity provider, the profile store, and the routing
//! policy, and hands out the pieces the views use: a session handle, a
//! navigator bound to that handle, and the account flows. Nothing in the
//! crate reaches for a global; every consumer gets its session from here.

use std::sync::Arc;

use tracing::info;

use crate::accounts::Accounts;
use crate::config::{ClinicConfig, ConfigError, IdentityBackend, ProfileBackend};
use crate::identity::memory::MemoryIdentityProvider;
use crate::identity::rest::RestIdentityProvider;
use crate::identity::{AuthError, IdentityProvider};
use crate::navigator::Navigator;
use crate::profile::firestore::{FirestoreProfileStore, FirestoreSettings};
use crate::profile::memory::MemoryProfileStore;
use crate::profile::postgres::PgProfileStore;
use crate::profile::{ProfileStore, StoreError};
use crate::routes::RouteTable;
use crate::routes::authorizer::Authorizer;
use crate::session::SessionHandle;
use crate::session::resolver::{ResolverOptions, SessionResolver};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("identity provider setup failed: {0}")]
    Identity(#[from] AuthError),
    #[error("profile store setup failed: {0}")]
    Store(#[from] StoreError),
    #[error("database init failed: {0}")]
    Db(#[from] sqlx::Error),
}

pub struct Clinic {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    table: RouteTable,
    authorizer: Authorizer,
    options: ResolverOptions,
}

impl Clinic {
    /// Wire explicit backends with the clinic route table and default paths.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn ProfileStore>, options: ResolverOptions) -> Self {
        Self { provider, store, table: RouteTable::clinic(), authorizer: Authorizer::default(), options }
    }

    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Build backends from configuration. Connects to the database and runs
    /// migrations for the Postgres profile backend.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built or the database is
    /// unreachable.
    pub async fn from_config(config: &ClinicConfig) -> Result<Self, StartupError> {
        let provider: Arc<dyn IdentityProvider> = match config.identity_backend {
            IdentityBackend::Memory => Arc::new(MemoryIdentityProvider::new()),
            IdentityBackend::Rest => {
                let api_key = required(config.api_key.as_ref(), "CLINIC_API_KEY")?;
                Arc::new(RestIdentityProvider::new(api_key, &config.auth_base_url)?)
            }
        };

        let store: Arc<dyn ProfileStore> = match config.profile_backend {
            ProfileBackend::Memory => Arc::new(MemoryProfileStore::new()),
            ProfileBackend::Firestore => {
                let settings = FirestoreSettings {
                    base_url: config.store_base_url.clone(),
                    project_id: required(config.project_id.as_ref(), "CLINIC_PROJECT_ID")?,
                    api_key: required(config.api_key.as_ref(), "CLINIC_API_KEY")?,
                    collection: config.profile_collection.clone(),
                    poll_interval: config.poll_interval,
                };
                Arc::new(FirestoreProfileStore::new(settings, provider.subscribe())?)
            }
            ProfileBackend::Postgres => {
                let url = required(config.database_url.as_ref(), "DATABASE_URL")?;
                Arc::new(PgProfileStore::new(crate::db::init_pool(&url, config.db_max_connections).await?))
            }
        };

        info!(
            identity = ?config.identity_backend,
            profile = ?config.profile_backend,
            mode = ?config.profile_mode,
            "clinic backends ready"
        );

        let authorizer = Authorizer::new(config.login_path.clone(), config.landing_path.clone());
        Ok(Self::new(provider, store, config.resolver_options()).with_authorizer(authorizer))
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    #[must_use]
    pub fn routes(&self) -> RouteTable {
        self.table
    }

    #[must_use]
    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    #[must_use]
    pub fn accounts(&self) -> Accounts {
        Accounts::new(Arc::clone(&self.provider), Arc::clone(&self.store))
    }

    /// Start a session resolver. Must be called inside a tokio runtime; the
    /// resolver runs until the last clone of the handle is dropped.
    #[must_use]
    pub fn session(&self) -> SessionHandle {
        SessionResolver::new(Arc::clone(&self.provider), Arc::clone(&self.store), self.options).observe()
    }

    #[must_use]
    pub fn navigator(&self, session: SessionHandle) -> Navigator {
        Navigator::new(self.table, self.authorizer.clone(), session)
    }
}

fn required(value: Option<&String>, var: &'static str) -> Result<String, ConfigError> {
    value.cloned().ok_or(ConfigError::Missing { var })
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
