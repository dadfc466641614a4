//! Configs service.

use async_trait::async_trait;
use mockall::automock;
use sqlx::PgPool;

use crate::domain::{
    configs::{
        errors::ConfigsServiceError,
        keys,
        records::{ConfigRevisionRecord, EnvMap},
        repository::PgConfigsRepository,
    },
    tenants::records::TenantId,
};

/// A merge request against the active revision.
#[derive(Debug, Clone, Default)]
pub struct ConfigPatch {
    pub values: EnvMap,
    pub remove_keys: Vec<String>,
}

/// Result of applying a patch.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub revision: ConfigRevisionRecord,

    /// False when the merged map equals the active one and no revision was
    /// written.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct PgConfigsService {
    repository: PgConfigsRepository,
}

impl PgConfigsService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: PgConfigsRepository::new(pool),
        }
    }
}

#[async_trait]
impl ConfigsService for PgConfigsService {
    async fn active_config(
        &self,
        tenant: &TenantId,
    ) -> Result<ConfigRevisionRecord, ConfigsServiceError> {
        self.repository
            .active_config(tenant)
            .await
            .map_err(ConfigsServiceError::from)?
            .ok_or(ConfigsServiceError::NotFound)
    }

    async fn patch(
        &self,
        tenant: &TenantId,
        patch: ConfigPatch,
    ) -> Result<PatchOutcome, ConfigsServiceError> {
        for key in patch.values.keys().chain(patch.remove_keys.iter()) {
            if !keys::is_valid_key(key) {
                return Err(ConfigsServiceError::InvalidKey(key.clone()));
            }
        }

        let active = self.active_config(tenant).await?;

        let mut merged = active.env.clone();
        merged.extend(patch.values);

        for key in &patch.remove_keys {
            merged.remove(key);
        }

        if merged == active.env {
            return Ok(PatchOutcome {
                revision: active,
                changed: false,
            });
        }

        let revision = self
            .repository
            .create_active_revision(tenant, &merged)
            .await?;

        Ok(PatchOutcome {
            revision,
            changed: true,
        })
    }
}

#[automock]
#[async_trait]
pub trait ConfigsService: Send + Sync {
    /// Returns the single active revision for a tenant.
    async fn active_config(
        &self,
        tenant: &TenantId,
    ) -> Result<ConfigRevisionRecord, ConfigsServiceError>;

    /// Merges values into the active revision, producing the next one.
    async fn patch(
        &self,
        tenant: &TenantId,
        patch: ConfigPatch,
    ) -> Result<PatchOutcome, ConfigsServiceError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::test::TestContext;

    #[tokio::test]
    async fn setup_leaves_revision_one_active() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        let active = ctx.configs.active_config(&tenant.id).await?;

        assert_eq!(active.revision, 1);
        assert!(active.is_active);

        Ok(())
    }

    #[tokio::test]
    async fn patch_creates_strictly_greater_revision() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        let before = ctx.configs.active_config(&tenant.id).await?;

        let outcome = ctx
            .configs
            .patch(
                &tenant.id,
                ConfigPatch {
                    values: [("NEXUS_EXTRA".to_string(), "on".to_string())]
                        .into_iter()
                        .collect(),
                    remove_keys: vec![],
                },
            )
            .await?;

        assert!(outcome.changed);
        assert!(outcome.revision.revision > before.revision);

        let after = ctx.configs.active_config(&tenant.id).await?;

        assert_eq!(after.revision, outcome.revision.revision);
        assert_eq!(after.env.get("NEXUS_EXTRA").map(String::as_str), Some("on"));

        Ok(())
    }

    #[tokio::test]
    async fn noop_patch_keeps_active_revision() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        let before = ctx.configs.active_config(&tenant.id).await?;

        let outcome = ctx
            .configs
            .patch(&tenant.id, ConfigPatch::default())
            .await?;

        assert!(!outcome.changed);
        assert_eq!(outcome.revision.revision, before.revision);

        Ok(())
    }

    #[tokio::test]
    async fn remove_keys_drops_values() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        let outcome = ctx
            .configs
            .patch(
                &tenant.id,
                ConfigPatch {
                    values: EnvMap::new(),
                    remove_keys: vec![keys::OPENROUTER_API_KEY.to_string()],
                },
            )
            .await?;

        assert!(outcome.changed);
        assert!(!outcome.revision.env.contains_key(keys::OPENROUTER_API_KEY));

        Ok(())
    }

    #[tokio::test]
    async fn malformed_key_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        let result = ctx
            .configs
            .patch(
                &tenant.id,
                ConfigPatch {
                    values: [("BAD-KEY".to_string(), "x".to_string())]
                        .into_iter()
                        .collect(),
                    remove_keys: vec![],
                },
            )
            .await;

        assert!(
            matches!(result, Err(ConfigsServiceError::InvalidKey(ref key)) if key == "BAD-KEY"),
            "expected InvalidKey, got {result:?}"
        );

        Ok(())
    }
}
