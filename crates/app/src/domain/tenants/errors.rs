//! Tenants service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TenantsServiceError {
    /// The owner already has a tenant.
    #[error("user already owns a tenant")]
    AlreadyExists,

    #[error("tenant not found")]
    NotFound,

    /// The tenant exists but belongs to a different user.
    #[error("tenant is owned by another user")]
    NotOwned,

    #[error("related resource not found")]
    InvalidReference,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for TenantsServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}
