//! Prompts service.

use async_trait::async_trait;
use mockall::automock;
use sqlx::PgPool;

use crate::domain::{
    prompts::{
        errors::PromptsServiceError,
        records::{ArtifactName, PromptRevisionRecord},
        repository::PgPromptsRepository,
    },
    tenants::records::TenantId,
};

#[derive(Debug, Clone)]
pub struct PgPromptsService {
    repository: PgPromptsRepository,
}

impl PgPromptsService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: PgPromptsRepository::new(pool),
        }
    }
}

#[async_trait]
impl PromptsService for PgPromptsService {
    async fn list_active(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<PromptRevisionRecord>, PromptsServiceError> {
        self.repository.list_active(tenant).await.map_err(Into::into)
    }

    async fn put(
        &self,
        tenant: &TenantId,
        name: &ArtifactName,
        content: &str,
    ) -> Result<PromptRevisionRecord, PromptsServiceError> {
        self.repository
            .put(tenant, name, content)
            .await
            .map_err(Into::into)
    }
}

#[automock]
#[async_trait]
pub trait PromptsService: Send + Sync {
    /// Active prompt revisions for a tenant, ordered by name.
    async fn list_active(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<PromptRevisionRecord>, PromptsServiceError>;

    /// Writes revision n+1 and makes it the active one.
    async fn put(
        &self,
        tenant: &TenantId,
        name: &ArtifactName,
        content: &str,
    ) -> Result<PromptRevisionRecord, PromptsServiceError>;
}
