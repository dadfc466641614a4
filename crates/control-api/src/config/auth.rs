//! Session Auth Config

use clap::Args;
use trellis_app::{
    auth::SessionSigner,
    signer::{SignerError, SigningKey},
};

/// Session token settings.
#[derive(Debug, Args)]
pub struct SessionConfig {
    /// Session signing key (min 32 bytes)
    #[arg(long, env = "SESSION_SIGNING_KEY", hide_env_values = true)]
    pub session_signing_key: String,

    /// Previous session key honoured during rotation
    #[arg(long, env = "SESSION_SIGNING_KEY_PREVIOUS", hide_env_values = true)]
    pub session_signing_key_previous: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL_SECONDS", default_value = "3600")]
    pub access_token_ttl_seconds: i64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL_SECONDS", default_value = "2592000")]
    pub refresh_token_ttl_seconds: i64,

    /// Signup attempts allowed per client per minute
    #[arg(long, env = "RATELIMIT_SIGNUP_PER_MINUTE", default_value = "10")]
    pub ratelimit_signup_per_minute: usize,
}

impl SessionConfig {
    /// Build the session signer, failing fast on weak keys.
    pub fn session_signer(&self) -> Result<SessionSigner, SignerError> {
        let key = SigningKey::new(
            self.session_signing_key.clone(),
            self.session_signing_key_previous.clone(),
        )?;

        Ok(SessionSigner::new(
            key,
            self.access_token_ttl_seconds,
            self.refresh_token_ttl_seconds,
        ))
    }
}
