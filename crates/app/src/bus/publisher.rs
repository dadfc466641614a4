//! Durable event publisher.

use async_trait::async_trait;
use mockall::automock;
use sqlx::PgPool;
use tracing::debug;

use crate::domain::{
    events::{EventsServiceError, PgEventsRepository, types::EventKind},
    tenants::{PgTenantsRepository, records::TenantId},
};

/// Publish-side handle to the bus.
#[automock]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Append an event and return its id. The event is visible to
    /// subscribers only after the underlying transaction commits.
    async fn publish(
        &self,
        tenant: &TenantId,
        kind: EventKind,
    ) -> Result<i64, EventsServiceError>;

    /// Highest event id recorded for the tenant, 0 when none.
    async fn latest_event_id(&self, tenant: &TenantId) -> Result<i64, EventsServiceError>;
}

#[derive(Debug, Clone)]
pub struct PgEventPublisher {
    repository: PgEventsRepository,
}

impl PgEventPublisher {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: PgEventsRepository::new(pool),
        }
    }
}

#[async_trait]
impl EventSink for PgEventPublisher {
    async fn publish(
        &self,
        tenant: &TenantId,
        kind: EventKind,
    ) -> Result<i64, EventsServiceError> {
        let event_type = kind.event_type().to_string();
        let payload = kind.payload();

        let mut tx = self.repository.pool().begin().await.map_err(EventsServiceError::from)?;

        let record =
            PgEventsRepository::append_in_tx(&mut tx, tenant, &event_type, &payload).await?;

        // Keep the tenant row's actual_state in lockstep with the stream so
        // the event and its projection commit together.
        if let Some((state, error)) = kind.projected_state() {
            PgTenantsRepository::project_state(&mut tx, tenant, state, error).await?;
        }

        tx.commit().await.map_err(EventsServiceError::from)?;

        debug!(
            tenant_id = %tenant,
            event_id = record.event_id,
            event_type = %event_type,
            "event published"
        );

        Ok(record.event_id)
    }

    async fn latest_event_id(&self, tenant: &TenantId) -> Result<i64, EventsServiceError> {
        self.repository
            .latest_event_id(tenant)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        bus::EventSink as _,
        domain::{
            events::types::EventKind,
            tenants::{TenantsService as _, records::TenantState},
        },
        test::TestContext,
    };

    #[tokio::test]
    async fn publish_projects_runtime_state_onto_tenant() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        ctx.publish(&tenant.id, EventKind::WhatsappConnected).await?;

        let record = ctx
            .tenants
            .tenant_for_owner(&tenant.id, tenant.owner_user_id)
            .await?;

        assert_eq!(record.actual_state, TenantState::Running);

        ctx.publish(
            &tenant.id,
            EventKind::RuntimeError {
                error: Some("docker_command_failed".to_string()),
                message: "compose up failed".to_string(),
            },
        )
        .await?;

        let record = ctx
            .tenants
            .tenant_for_owner(&tenant.id, tenant.owner_user_id)
            .await?;

        assert_eq!(record.actual_state, TenantState::Error);
        assert_eq!(record.last_error.as_deref(), Some("compose up failed"));

        Ok(())
    }

    #[tokio::test]
    async fn latest_event_id_tracks_publishes() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        assert_eq!(ctx.sink.latest_event_id(&tenant.id).await?, 0);

        let id = ctx.publish(&tenant.id, EventKind::WhatsappConnected).await?;

        assert_eq!(ctx.sink.latest_event_id(&tenant.id).await?, id);

        Ok(())
    }
}
