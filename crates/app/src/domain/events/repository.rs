//! Events Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};

use crate::domain::{events::records::EventRecord, tenants::records::TenantId};

const APPEND_EVENT_SQL: &str = include_str!("sql/append_event.sql");
const RECENT_AFTER_SQL: &str = include_str!("sql/recent_events_after.sql");
const RECENT_LATEST_SQL: &str = include_str!("sql/recent_events_latest.sql");
const LATEST_EVENT_ID_SQL: &str = include_str!("sql/latest_event_id.sql");
const EVENTS_SINCE_SQL: &str = include_str!("sql/events_since.sql");
const MAX_EVENT_ID_SQL: &str = "SELECT COALESCE(MAX(event_id), 0) FROM events";

/// Advisory lock key serialising event inserts. Commit order then equals
/// event-id order, which the fanout relies on.
const EVENT_APPEND_LOCK_SQL: &str = "SELECT pg_advisory_xact_lock(815141)";

/// `pg_notify` channel carrying `{event_id, tenant_id}` wakeups.
pub(crate) const EVENTS_CHANNEL: &str = "trellis_events";

const NOTIFY_SQL: &str = "SELECT pg_notify($1, $2)";

#[derive(Debug, Clone)]
pub(crate) struct PgEventsRepository {
    pool: PgPool,
}

impl PgEventsRepository {
    #[must_use]
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append an event inside the caller's transaction.
    ///
    /// Takes the append advisory lock, inserts the row, and queues a
    /// notification that fires on commit.
    pub(crate) async fn append_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        tenant: &TenantId,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<EventRecord, sqlx::Error> {
        query(EVENT_APPEND_LOCK_SQL).execute(&mut **tx).await?;

        let record = query_as::<Postgres, EventRecord>(APPEND_EVENT_SQL)
            .bind(tenant.as_str())
            .bind(event_type)
            .bind(payload)
            .fetch_one(&mut **tx)
            .await?;

        let wakeup = serde_json::json!({
            "event_id": record.event_id,
            "tenant_id": record.tenant_id.as_str(),
        });

        query(NOTIFY_SQL)
            .bind(EVENTS_CHANNEL)
            .bind(wakeup.to_string())
            .execute(&mut **tx)
            .await?;

        Ok(record)
    }

    /// Events with `event_id > after`, oldest first.
    pub(crate) async fn recent_after(
        &self,
        tenant: &TenantId,
        after_event_id: i64,
        types: Option<&[String]>,
        limit: i64,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        query_as::<Postgres, EventRecord>(RECENT_AFTER_SQL)
            .bind(tenant.as_str())
            .bind(after_event_id)
            .bind(types)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    /// The most recent `limit` events, newest first.
    pub(crate) async fn recent_latest(
        &self,
        tenant: &TenantId,
        types: Option<&[String]>,
        limit: i64,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        query_as::<Postgres, EventRecord>(RECENT_LATEST_SQL)
            .bind(tenant.as_str())
            .bind(types)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    pub(crate) async fn latest_event_id(&self, tenant: &TenantId) -> Result<i64, sqlx::Error> {
        query_scalar(LATEST_EVENT_ID_SQL)
            .bind(tenant.as_str())
            .fetch_one(&self.pool)
            .await
    }

    /// All events across tenants with `event_id > after`, oldest first.
    pub(crate) async fn events_since(
        &self,
        after_event_id: i64,
        limit: i64,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        query_as::<Postgres, EventRecord>(EVENTS_SINCE_SQL)
            .bind(after_event_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    pub(crate) async fn max_event_id(&self) -> Result<i64, sqlx::Error> {
        query_scalar(MAX_EVENT_ID_SQL).fetch_one(&self.pool).await
    }
}

impl<'r> FromRow<'r, PgRow> for EventRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let tenant_id = TenantId::parse(&row.try_get::<String, _>("tenant_id")?).map_err(
            |source| sqlx::Error::ColumnDecode {
                index: "tenant_id".to_string(),
                source: Box::new(source),
            },
        )?;

        Ok(Self {
            event_id: row.try_get("event_id")?,
            tenant_id,
            event_type: row.try_get("type")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
