//! Tenants Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::domain::tenants::{
    data::NewTenant,
    records::{TenantId, TenantRecord, TenantState},
};

const CREATE_TENANT_SQL: &str = include_str!("sql/create_tenant.sql");
const CREATE_INITIAL_CONFIG_SQL: &str = include_str!("sql/create_initial_config.sql");
const CREATE_INITIAL_PROMPT_SQL: &str = include_str!("sql/create_initial_prompt.sql");
const CREATE_INITIAL_SKILL_SQL: &str = include_str!("sql/create_initial_skill.sql");
const FIND_TENANT_SQL: &str = include_str!("sql/find_tenant.sql");
const FIND_TENANT_BY_OWNER_SQL: &str = include_str!("sql/find_tenant_by_owner.sql");
const UPDATE_STATES_SQL: &str = include_str!("sql/update_states.sql");
const RECORD_ERROR_SQL: &str = include_str!("sql/record_error.sql");
const SET_DEFAULTS_VERSION_SQL: &str = include_str!("sql/set_defaults_version.sql");

#[derive(Debug, Clone)]
/// PostgreSQL-backed tenants repository.
pub(crate) struct PgTenantsRepository {
    pool: PgPool,
}

impl PgTenantsRepository {
    #[must_use]
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write the tenant, its first config revision and initial artifacts in
    /// one transaction.
    pub(crate) async fn create_tenant(
        &self,
        tenant: &NewTenant,
    ) -> Result<TenantRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let record = query_as::<Postgres, TenantRecord>(CREATE_TENANT_SQL)
            .bind(tenant.id.as_str())
            .bind(tenant.owner_user_id)
            .bind(TenantState::Stopped.as_str())
            .bind(TenantState::Provisioning.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let env = serde_json::to_value(&tenant.initial_env)
            .map_err(|source| sqlx::Error::Encode(Box::new(source)))?;

        query(CREATE_INITIAL_CONFIG_SQL)
            .bind(tenant.id.as_str())
            .bind(env)
            .execute(&mut *tx)
            .await?;

        for prompt in &tenant.prompts {
            query(CREATE_INITIAL_PROMPT_SQL)
                .bind(tenant.id.as_str())
                .bind(&prompt.name)
                .bind(&prompt.content)
                .execute(&mut *tx)
                .await?;
        }

        for skill in &tenant.skills {
            query(CREATE_INITIAL_SKILL_SQL)
                .bind(tenant.id.as_str())
                .bind(&skill.name)
                .bind(&skill.content)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(record)
    }

    pub(crate) async fn find_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<TenantRecord>, sqlx::Error> {
        query_as::<Postgres, TenantRecord>(FIND_TENANT_SQL)
            .bind(tenant.as_str())
            .fetch_optional(&self.pool)
            .await
    }

    pub(crate) async fn find_tenant_by_owner(
        &self,
        owner_user_id: i64,
    ) -> Result<Option<TenantRecord>, sqlx::Error> {
        query_as::<Postgres, TenantRecord>(FIND_TENANT_BY_OWNER_SQL)
            .bind(owner_user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub(crate) async fn update_states(
        &self,
        tenant: &TenantId,
        desired: Option<TenantState>,
        actual: Option<TenantState>,
    ) -> Result<TenantRecord, sqlx::Error> {
        query_as::<Postgres, TenantRecord>(UPDATE_STATES_SQL)
            .bind(tenant.as_str())
            .bind(desired.map(TenantState::as_str))
            .bind(actual.map(TenantState::as_str))
            .fetch_one(&self.pool)
            .await
    }

    pub(crate) async fn record_error(
        &self,
        tenant: &TenantId,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        query(RECORD_ERROR_SQL)
            .bind(tenant.as_str())
            .bind(message)
            .execute(&self.pool)
            .await
            .map(|_| ())
    }

    pub(crate) async fn set_defaults_version(
        &self,
        tenant: &TenantId,
        version: &str,
    ) -> Result<(), sqlx::Error> {
        query(SET_DEFAULTS_VERSION_SQL)
            .bind(tenant.as_str())
            .bind(version)
            .execute(&self.pool)
            .await
            .map(|_| ())
    }

    /// Project a state observed on the event stream onto the tenant row,
    /// inside the caller's transaction so the event and the projection commit
    /// together.
    pub(crate) async fn project_state(
        tx: &mut Transaction<'_, Postgres>,
        tenant: &TenantId,
        actual: TenantState,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        if matches!(actual, TenantState::Error) {
            query(RECORD_ERROR_SQL)
                .bind(tenant.as_str())
                .bind(error.unwrap_or("runtime_error"))
                .execute(&mut **tx)
                .await?;
        } else {
            query(UPDATE_STATES_SQL)
                .bind(tenant.as_str())
                .bind(None::<&str>)
                .bind(actual.as_str())
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }
}

impl<'r> FromRow<'r, PgRow> for TenantRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: parse_tenant_id(row.try_get("id")?)?,
            owner_user_id: row.try_get("owner_user_id")?,
            desired_state: parse_state(row.try_get("desired_state")?, "desired_state")?,
            actual_state: parse_state(row.try_get("actual_state")?, "actual_state")?,
            last_heartbeat: row
                .try_get::<Option<SqlxTimestamp>, _>("last_heartbeat")?
                .map(SqlxTimestamp::to_jiff),
            last_error: row.try_get("last_error")?,
            assistant_defaults_version: row.try_get("assistant_defaults_version")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

fn parse_tenant_id(value: String) -> Result<TenantId, sqlx::Error> {
    TenantId::parse(&value).map_err(|source| sqlx::Error::ColumnDecode {
        index: "id".to_string(),
        source: Box::new(source),
    })
}

fn parse_state(value: String, column: &str) -> Result<TenantState, sqlx::Error> {
    value.parse().map_err(|source| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    })
}
