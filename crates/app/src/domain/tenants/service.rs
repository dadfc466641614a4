//! Tenants service.

use async_trait::async_trait;
use mockall::automock;
use sqlx::PgPool;

use crate::domain::tenants::{
    data::NewTenant,
    errors::TenantsServiceError,
    records::{TenantId, TenantRecord, TenantState},
    repository::PgTenantsRepository,
};

#[derive(Debug, Clone)]
pub struct PgTenantsService {
    repository: PgTenantsRepository,
}

impl PgTenantsService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: PgTenantsRepository::new(pool),
        }
    }
}

#[async_trait]
impl TenantsService for PgTenantsService {
    async fn create_tenant(&self, tenant: NewTenant) -> Result<TenantRecord, TenantsServiceError> {
        self.repository
            .create_tenant(&tenant)
            .await
            .map_err(Into::into)
    }

    async fn tenant_by_owner(
        &self,
        owner_user_id: i64,
    ) -> Result<Option<TenantRecord>, TenantsServiceError> {
        self.repository
            .find_tenant_by_owner(owner_user_id)
            .await
            .map_err(Into::into)
    }

    async fn tenant_for_owner(
        &self,
        tenant: &TenantId,
        owner_user_id: i64,
    ) -> Result<TenantRecord, TenantsServiceError> {
        let record = self
            .repository
            .find_tenant(tenant)
            .await
            .map_err(TenantsServiceError::from)?
            .ok_or(TenantsServiceError::NotFound)?;

        if record.owner_user_id != owner_user_id {
            return Err(TenantsServiceError::NotOwned);
        }

        Ok(record)
    }

    async fn update_states(
        &self,
        tenant: &TenantId,
        desired: Option<TenantState>,
        actual: Option<TenantState>,
    ) -> Result<TenantRecord, TenantsServiceError> {
        self.repository
            .update_states(tenant, desired, actual)
            .await
            .map_err(Into::into)
    }

    async fn record_error(
        &self,
        tenant: &TenantId,
        message: &str,
    ) -> Result<(), TenantsServiceError> {
        self.repository
            .record_error(tenant, message)
            .await
            .map_err(Into::into)
    }

    async fn set_defaults_version(
        &self,
        tenant: &TenantId,
        version: &str,
    ) -> Result<(), TenantsServiceError> {
        self.repository
            .set_defaults_version(tenant, version)
            .await
            .map_err(Into::into)
    }
}

#[automock]
#[async_trait]
/// Tenant persistence operations.
pub trait TenantsService: Send + Sync {
    /// Creates a tenant together with its initial config and artifacts.
    async fn create_tenant(&self, tenant: NewTenant) -> Result<TenantRecord, TenantsServiceError>;

    /// Returns the tenant owned by the given user, if any.
    async fn tenant_by_owner(
        &self,
        owner_user_id: i64,
    ) -> Result<Option<TenantRecord>, TenantsServiceError>;

    /// Returns the tenant only when it is owned by the given user.
    async fn tenant_for_owner(
        &self,
        tenant: &TenantId,
        owner_user_id: i64,
    ) -> Result<TenantRecord, TenantsServiceError>;

    /// Updates desired and/or actual state; `None` leaves a column untouched.
    async fn update_states(
        &self,
        tenant: &TenantId,
        desired: Option<TenantState>,
        actual: Option<TenantState>,
    ) -> Result<TenantRecord, TenantsServiceError>;

    /// Moves the tenant into the error state with the given message.
    async fn record_error(
        &self,
        tenant: &TenantId,
        message: &str,
    ) -> Result<(), TenantsServiceError>;

    /// Records the assistant defaults version last applied to this tenant.
    async fn set_defaults_version(
        &self,
        tenant: &TenantId,
        version: &str,
    ) -> Result<(), TenantsServiceError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::test::TestContext;

    #[tokio::test]
    async fn create_tenant_returns_record_with_initial_states() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        assert_eq!(tenant.desired_state, TenantState::Stopped);
        assert_eq!(tenant.actual_state, TenantState::Provisioning);
        assert!(tenant.last_error.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn second_tenant_for_same_owner_conflicts() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        let result = ctx
            .tenants
            .create_tenant(NewTenant {
                id: TenantId::generate(),
                owner_user_id: tenant.owner_user_id,
                initial_env: ctx.initial_env(),
                prompts: vec![],
                skills: vec![],
            })
            .await;

        assert!(
            matches!(result, Err(TenantsServiceError::AlreadyExists)),
            "expected AlreadyExists, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn tenant_for_owner_rejects_foreign_user() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;
        let other = ctx.create_user("other@example.com").await?;

        let result = ctx.tenants.tenant_for_owner(&tenant.id, other.id).await;

        assert!(
            matches!(result, Err(TenantsServiceError::NotOwned)),
            "expected NotOwned, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn update_states_clears_error_outside_error_state() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        ctx.tenants
            .record_error(&tenant.id, "engine exploded")
            .await?;

        let errored = ctx
            .tenants
            .tenant_for_owner(&tenant.id, tenant.owner_user_id)
            .await?;

        assert_eq!(errored.actual_state, TenantState::Error);
        assert_eq!(errored.last_error.as_deref(), Some("engine exploded"));

        let recovered = ctx
            .tenants
            .update_states(&tenant.id, Some(TenantState::Running), Some(TenantState::Running))
            .await?;

        assert_eq!(recovered.actual_state, TenantState::Running);
        assert!(recovered.last_error.is_none());
        assert!(recovered.last_heartbeat.is_some());

        Ok(())
    }
}
