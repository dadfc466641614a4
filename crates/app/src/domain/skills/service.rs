//! Skills service.

use async_trait::async_trait;
use mockall::automock;
use sqlx::PgPool;

use crate::domain::{
    prompts::records::ArtifactName,
    skills::{
        errors::SkillsServiceError, records::SkillRevisionRecord, repository::PgSkillsRepository,
    },
    tenants::records::TenantId,
};

#[derive(Debug, Clone)]
pub struct PgSkillsService {
    repository: PgSkillsRepository,
}

impl PgSkillsService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: PgSkillsRepository::new(pool),
        }
    }
}

#[async_trait]
impl SkillsService for PgSkillsService {
    async fn list_active(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<SkillRevisionRecord>, SkillsServiceError> {
        self.repository.list_active(tenant).await.map_err(Into::into)
    }

    async fn put(
        &self,
        tenant: &TenantId,
        skill_id: &ArtifactName,
        content: &str,
    ) -> Result<SkillRevisionRecord, SkillsServiceError> {
        self.repository
            .put(tenant, skill_id, content)
            .await
            .map_err(Into::into)
    }
}

#[automock]
#[async_trait]
pub trait SkillsService: Send + Sync {
    /// Active skill revisions for a tenant, ordered by skill id.
    async fn list_active(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<SkillRevisionRecord>, SkillsServiceError>;

    /// Writes revision n+1 and makes it the active one.
    async fn put(
        &self,
        tenant: &TenantId,
        skill_id: &ArtifactName,
        content: &str,
    ) -> Result<SkillRevisionRecord, SkillsServiceError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::test::TestContext;

    #[tokio::test]
    async fn put_retains_old_revisions_for_audit() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;
        let skill = ArtifactName::parse("calendar")?;

        ctx.skills.put(&tenant.id, &skill, "v1").await?;
        let latest = ctx.skills.put(&tenant.id, &skill, "v2").await?;

        assert_eq!(latest.revision, 2);

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM skill_revisions WHERE tenant_id = $1 AND skill_id = $2",
        )
        .bind(tenant.id.as_str())
        .bind(skill.as_str())
        .fetch_one(ctx.db.pool())
        .await?;

        assert_eq!(count, 2, "old revisions are retained");

        Ok(())
    }
}
