//! Auth handlers.

pub(crate) mod login;
pub(crate) mod refresh;
pub(crate) mod signup;

use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};
use trellis_app::auth::{SessionTokens, UserRecord};

use crate::errors::ApiError;

pub(crate) const MIN_PASSWORD_LENGTH: usize = 8;
pub(crate) const MAX_PASSWORD_LENGTH: usize = 256;

/// Public view of a user.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct UserResponse {
    pub id: i64,
    pub email: String,
    pub created_at: String,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at.to_string(),
        }
    }
}

/// Signup/login response: the user plus a token pair.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokensResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct TokensResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in_seconds: i64,
}

impl From<SessionTokens> for TokensResponse {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in_seconds: tokens.expires_in_seconds,
        }
    }
}

pub(crate) fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    let email = email.trim();

    if email.is_empty() || !email.contains('@') || email.len() > 320 {
        return Err(ApiError::bad_request("invalid_email", "Malformed email"));
    }

    if password.len() < MIN_PASSWORD_LENGTH || password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(
            "invalid_password",
            "Password must be between 8 and 256 characters",
        ));
    }

    Ok(())
}
