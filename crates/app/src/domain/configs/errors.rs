//! Configs service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigsServiceError {
    #[error("no active config revision for tenant")]
    NotFound,

    #[error("invalid config key: {0}")]
    InvalidKey(String),

    #[error("config revision conflict")]
    RevisionConflict,

    #[error("related resource not found")]
    InvalidReference,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for ConfigsServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::RevisionConflict,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}
