//! Auth repository.

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, PgPool, Postgres, Row, postgres::PgRow, query_as};

use crate::auth::records::UserRecord;

const CREATE_USER_SQL: &str = include_str!("sql/create_user.sql");
const FIND_USER_BY_EMAIL_SQL: &str = include_str!("sql/find_user_by_email.sql");
const FIND_USER_BY_ID_SQL: &str = include_str!("sql/find_user_by_id.sql");

#[derive(Debug, Clone)]
pub(crate) struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    #[must_use]
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<UserRecord, sqlx::Error> {
        query_as::<Postgres, UserRecord>(CREATE_USER_SQL)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
    }

    pub(crate) async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserRecord>, sqlx::Error> {
        query_as::<Postgres, UserRecord>(FIND_USER_BY_EMAIL_SQL)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub(crate) async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
        query_as::<Postgres, UserRecord>(FIND_USER_BY_ID_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for UserRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
