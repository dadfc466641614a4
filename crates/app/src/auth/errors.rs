//! Auth service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::auth::password::PasswordError;

#[derive(Debug, Error)]
pub enum AuthServiceError {
    /// The email is already registered.
    #[error("email already registered")]
    EmailTaken,

    /// Unknown email or wrong password. Deliberately indistinct.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    NotFound,

    #[error("password processing error")]
    Password(#[from] PasswordError),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for AuthServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::EmailTaken,
            Some(ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}
