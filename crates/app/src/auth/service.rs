//! Auth service.

use async_trait::async_trait;
use mockall::automock;
use sqlx::PgPool;

use crate::auth::{
    errors::AuthServiceError,
    password::{PasswordError, hash_password, verify_password},
    records::UserRecord,
    repository::PgAuthRepository,
};

#[derive(Debug, Clone)]
pub struct PgAuthService {
    repository: PgAuthRepository,
}

impl PgAuthService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: PgAuthRepository::new(pool),
        }
    }
}

#[async_trait]
impl AuthService for PgAuthService {
    async fn signup(&self, email: &str, password: &str) -> Result<UserRecord, AuthServiceError> {
        if self
            .repository
            .find_user_by_email(email)
            .await
            .map_err(AuthServiceError::from)?
            .is_some()
        {
            return Err(AuthServiceError::EmailTaken);
        }

        // Memory-hard hashing is CPU-bound; keep it off the async workers.
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|_| AuthServiceError::Password(PasswordError::Hash))??;

        self.repository
            .create_user(email, &password_hash)
            .await
            .map_err(Into::into)
    }

    async fn login(&self, email: &str, password: &str) -> Result<UserRecord, AuthServiceError> {
        let user = self
            .repository
            .find_user_by_email(email)
            .await
            .map_err(AuthServiceError::from)?
            .ok_or(AuthServiceError::InvalidCredentials)?;

        let password = password.to_string();
        let verifier = user.password_hash.clone();

        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &verifier))
            .await
            .map_err(|_| AuthServiceError::Password(PasswordError::Hash))??;

        if !valid {
            return Err(AuthServiceError::InvalidCredentials);
        }

        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> Result<UserRecord, AuthServiceError> {
        self.repository
            .find_user_by_id(id)
            .await
            .map_err(AuthServiceError::from)?
            .ok_or(AuthServiceError::NotFound)
    }
}

#[automock]
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Registers a new user; emails are unique case-insensitively.
    async fn signup(&self, email: &str, password: &str) -> Result<UserRecord, AuthServiceError>;

    /// Verifies credentials and returns the user.
    async fn login(&self, email: &str, password: &str) -> Result<UserRecord, AuthServiceError>;

    /// Resolves a user from verified token claims.
    async fn user_by_id(&self, id: i64) -> Result<UserRecord, AuthServiceError>;
}
