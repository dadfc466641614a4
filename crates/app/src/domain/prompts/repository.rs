//! Prompts Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, PgPool, Postgres, Row, postgres::PgRow, query, query_as};

use crate::domain::{
    prompts::records::{ArtifactName, PromptRevisionRecord},
    tenants::records::TenantId,
};

const LIST_ACTIVE_SQL: &str = include_str!("sql/list_active_prompts.sql");
const CREATE_REVISION_SQL: &str = include_str!("sql/create_prompt_revision.sql");
const DEACTIVATE_SQL: &str = include_str!("sql/deactivate_prompt.sql");

#[derive(Debug, Clone)]
pub(crate) struct PgPromptsRepository {
    pool: PgPool,
}

impl PgPromptsRepository {
    #[must_use]
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn list_active(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<PromptRevisionRecord>, sqlx::Error> {
        query_as::<Postgres, PromptRevisionRecord>(LIST_ACTIVE_SQL)
            .bind(tenant.as_str())
            .fetch_all(&self.pool)
            .await
    }

    /// Retire the active revision and insert the next one as active.
    pub(crate) async fn put(
        &self,
        tenant: &TenantId,
        name: &ArtifactName,
        content: &str,
    ) -> Result<PromptRevisionRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        query(DEACTIVATE_SQL)
            .bind(tenant.as_str())
            .bind(name.as_str())
            .execute(&mut *tx)
            .await?;

        let record = query_as::<Postgres, PromptRevisionRecord>(CREATE_REVISION_SQL)
            .bind(tenant.as_str())
            .bind(name.as_str())
            .bind(content)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(record)
    }
}

impl<'r> FromRow<'r, PgRow> for PromptRevisionRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let tenant_id = TenantId::parse(&row.try_get::<String, _>("tenant_id")?).map_err(
            |source| sqlx::Error::ColumnDecode {
                index: "tenant_id".to_string(),
                source: Box::new(source),
            },
        )?;

        let name = ArtifactName::parse(&row.try_get::<String, _>("name")?).map_err(|source| {
            sqlx::Error::ColumnDecode {
                index: "name".to_string(),
                source: Box::new(source),
            }
        })?;

        Ok(Self {
            tenant_id,
            name,
            revision: row.try_get("revision")?,
            content: row.try_get("content")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
