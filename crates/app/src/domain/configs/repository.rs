//! Configs Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, PgPool, Postgres, Row, postgres::PgRow, query, query_as};

use crate::domain::{
    configs::records::{ConfigRevisionRecord, EnvMap},
    tenants::records::TenantId,
};

const ACTIVE_CONFIG_SQL: &str = include_str!("sql/active_config.sql");
const CREATE_REVISION_SQL: &str = include_str!("sql/create_revision.sql");
const DEACTIVATE_REVISIONS_SQL: &str = include_str!("sql/deactivate_revisions.sql");

#[derive(Debug, Clone)]
pub(crate) struct PgConfigsRepository {
    pool: PgPool,
}

impl PgConfigsRepository {
    #[must_use]
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn active_config(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<ConfigRevisionRecord>, sqlx::Error> {
        query_as::<Postgres, ConfigRevisionRecord>(ACTIVE_CONFIG_SQL)
            .bind(tenant.as_str())
            .fetch_optional(&self.pool)
            .await
    }

    /// Deactivate prior revisions and insert the next one as active, in one
    /// transaction.
    pub(crate) async fn create_active_revision(
        &self,
        tenant: &TenantId,
        env: &EnvMap,
    ) -> Result<ConfigRevisionRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        query(DEACTIVATE_REVISIONS_SQL)
            .bind(tenant.as_str())
            .execute(&mut *tx)
            .await?;

        let env_json = serde_json::to_value(env)
            .map_err(|source| sqlx::Error::Encode(Box::new(source)))?;

        let record = query_as::<Postgres, ConfigRevisionRecord>(CREATE_REVISION_SQL)
            .bind(tenant.as_str())
            .bind(env_json)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(record)
    }
}

impl<'r> FromRow<'r, PgRow> for ConfigRevisionRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let env: EnvMap = serde_json::from_value(row.try_get("env")?).map_err(|source| {
            sqlx::Error::ColumnDecode {
                index: "env".to_string(),
                source: Box::new(source),
            }
        })?;

        let tenant_id = TenantId::parse(&row.try_get::<String, _>("tenant_id")?).map_err(
            |source| sqlx::Error::ColumnDecode {
                index: "tenant_id".to_string(),
                source: Box::new(source),
            },
        )?;

        Ok(Self {
            tenant_id,
            revision: row.try_get("revision")?,
            env,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
