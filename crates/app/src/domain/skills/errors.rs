//! Skills service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkillsServiceError {
    #[error("skill not found")]
    NotFound,

    #[error("skill revision conflict")]
    RevisionConflict,

    #[error("related resource not found")]
    InvalidReference,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for SkillsServiceError {
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
