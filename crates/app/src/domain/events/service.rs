//! Events service.

use async_trait::async_trait;
use mockall::automock;
use sqlx::PgPool;

use crate::domain::{
    events::{errors::EventsServiceError, records::EventRecord, repository::PgEventsRepository},
    tenants::records::TenantId,
};

/// Default page size for the recent-events window.
pub const DEFAULT_RECENT_LIMIT: i64 = 50;

/// Hard cap on the recent-events window.
pub const MAX_RECENT_LIMIT: i64 = 200;

/// Query parameters for the incremental poll path.
#[derive(Debug, Clone, Default)]
pub struct RecentQuery {
    pub limit: Option<i64>,
    pub after_event_id: Option<i64>,
    pub types: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct PgEventsService {
    repository: PgEventsRepository,
}

impl PgEventsService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: PgEventsRepository::new(pool),
        }
    }
}

#[async_trait]
impl EventsService for PgEventsService {
    async fn recent(
        &self,
        tenant: &TenantId,
        query: RecentQuery,
    ) -> Result<Vec<EventRecord>, EventsServiceError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT);

        let types = query
            .types
            .filter(|types| !types.is_empty());

        let events = match query.after_event_id {
            Some(after) => {
                self.repository
                    .recent_after(tenant, after, types.as_deref(), limit)
                    .await?
            }
            None => {
                let mut events = self
                    .repository
                    .recent_latest(tenant, types.as_deref(), limit)
                    .await?;

                events.reverse();
                events
            }
        };

        Ok(events)
    }

    async fn latest_event_id(&self, tenant: &TenantId) -> Result<i64, EventsServiceError> {
        self.repository
            .latest_event_id(tenant)
            .await
            .map_err(Into::into)
    }
}

#[automock]
#[async_trait]
pub trait EventsService: Send + Sync {
    /// Events for a tenant in ascending id order, windowed and filtered.
    async fn recent(
        &self,
        tenant: &TenantId,
        query: RecentQuery,
    ) -> Result<Vec<EventRecord>, EventsServiceError>;

    /// Highest event id recorded for the tenant, 0 when none.
    async fn latest_event_id(&self, tenant: &TenantId) -> Result<i64, EventsServiceError>;
}
