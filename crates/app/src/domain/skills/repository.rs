//! Skills Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, PgPool, Postgres, Row, postgres::PgRow, query, query_as};

use crate::domain::{
    prompts::records::ArtifactName,
    skills::records::SkillRevisionRecord,
    tenants::records::TenantId,
};

const LIST_ACTIVE_SQL: &str = include_str!("sql/list_active_skills.sql");
const CREATE_REVISION_SQL: &str = include_str!("sql/create_skill_revision.sql");
const DEACTIVATE_SQL: &str = include_str!("sql/deactivate_skill.sql");

#[derive(Debug, Clone)]
pub(crate) struct PgSkillsRepository {
    pool: PgPool,
}

impl PgSkillsRepository {
    #[must_use]
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn list_active(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<SkillRevisionRecord>, sqlx::Error> {
        query_as::<Postgres, SkillRevisionRecord>(LIST_ACTIVE_SQL)
            .bind(tenant.as_str())
            .fetch_all(&self.pool)
            .await
    }

    pub(crate) async fn put(
        &self,
        tenant: &TenantId,
        skill_id: &ArtifactName,
        content: &str,
    ) -> Result<SkillRevisionRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        query(DEACTIVATE_SQL)
            .bind(tenant.as_str())
            .bind(skill_id.as_str())
            .execute(&mut *tx)
            .await?;

        let record = query_as::<Postgres, SkillRevisionRecord>(CREATE_REVISION_SQL)
            .bind(tenant.as_str())
            .bind(skill_id.as_str())
            .bind(content)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(record)
    }
}

impl<'r> FromRow<'r, PgRow> for SkillRevisionRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let tenant_id = TenantId::parse(&row.try_get::<String, _>("tenant_id")?).map_err(
            |source| sqlx::Error::ColumnDecode {
                index: "tenant_id".to_string(),
                source: Box::new(source),
            },
        )?;

        let skill_id = ArtifactName::parse(&row.try_get::<String, _>("skill_id")?).map_err(
            |source| sqlx::Error::ColumnDecode {
                index: "skill_id".to_string(),
                source: Box::new(source),
            },
        )?;

        Ok(Self {
            tenant_id,
            skill_id,
            revision: row.try_get("revision")?,
            content: row.try_get("content")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
