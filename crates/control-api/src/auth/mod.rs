//! Authentication surface.

pub(crate) mod handlers;
pub(crate) mod middleware;
pub(crate) mod rate_limit;

use crate::errors::ApiError;
use trellis_app::auth::AuthServiceError;

pub(crate) fn into_api_error(error: &AuthServiceError) -> ApiError {
    match error {
        AuthServiceError::EmailTaken => ApiError::new(
            salvo::http::StatusCode::CONFLICT,
            "email_already_registered",
            "Email already registered",
        ),
        AuthServiceError::InvalidCredentials => ApiError::new(
            salvo::http::StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "Invalid credentials",
        ),
        AuthServiceError::NotFound => ApiError::unauthorized(),
        AuthServiceError::Password(source) => {
            ApiError::log_internal("password processing failed", source)
        }
        AuthServiceError::Sql(source) => ApiError::log_internal("auth storage failure", source),
    }
}
