//! Events service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventsServiceError {
    /// The event names a tenant the store does not know.
    #[error("unknown tenant")]
    UnknownTenant,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for EventsServiceError {
    fn from(error: Error) -> Self {
        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::ForeignKeyViolation) => Self::UnknownTenant,
            _ => Self::Sql(error),
        }
    }
}
