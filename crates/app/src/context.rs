//! App Context

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::{
    auth::{AuthService, PgAuthService},
    bus::{EventSink, PgEventPublisher},
    database,
    domain::{
        configs::{ConfigsService, PgConfigsService},
        events::{EventsService, PgEventsService},
        prompts::{PgPromptsService, PromptsService},
        skills::{PgSkillsService, SkillsService},
        tenants::{PgTenantsService, TenantsService},
    },
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to run database migrations")]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

/// Process-scoped handle to every domain service.
///
/// Built once at startup and injected into HTTP state; handlers only ever see
/// the trait objects so tests can swap in mocks.
#[derive(Clone)]
pub struct AppContext {
    pub auth: Arc<dyn AuthService>,
    pub tenants: Arc<dyn TenantsService>,
    pub configs: Arc<dyn ConfigsService>,
    pub prompts: Arc<dyn PromptsService>,
    pub skills: Arc<dyn SkillsService>,
    pub events: Arc<dyn EventsService>,
    pub sink: Arc<dyn EventSink>,
}

impl AppContext {
    /// Build application context from an existing pool.
    #[must_use]
    pub fn from_pool(pool: &PgPool) -> Self {
        Self {
            auth: Arc::new(PgAuthService::new(pool.clone())),
            tenants: Arc::new(PgTenantsService::new(pool.clone())),
            configs: Arc::new(PgConfigsService::new(pool.clone())),
            prompts: Arc::new(PgPromptsService::new(pool.clone())),
            skills: Arc::new(PgSkillsService::new(pool.clone())),
            events: Arc::new(PgEventsService::new(pool.clone())),
            sink: Arc::new(PgEventPublisher::new(pool.clone())),
        }
    }

    /// Build application context from a database URL, running migrations.
    ///
    /// # Errors
    ///
    /// Returns an error when establishing a database connection or applying
    /// migrations fails.
    pub async fn from_database_url(url: &str) -> Result<(Self, PgPool), AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        database::migrate(&pool)
            .await
            .map_err(AppInitError::Migrate)?;

        Ok((Self::from_pool(&pool), pool))
    }
}
