//! Worker Dispatch Config

use clap::Args;
use trellis_app::signer::{SignerError, SigningKey};

use crate::worker::HttpWorkerClient;

/// Runner dispatch settings.
#[derive(Debug, Args)]
pub struct WorkerConfig {
    /// Base URL of the runner's private surface
    #[arg(long, env = "WORKER_BASE_URL", default_value = "http://127.0.0.1:8600")]
    pub worker_base_url: String,

    /// Action token signing key shared with the runner (min 32 bytes)
    #[arg(long, env = "ACTION_SIGNING_KEY", hide_env_values = true)]
    pub action_signing_key: String,

    /// Previous action key honoured during rotation
    #[arg(long, env = "ACTION_SIGNING_KEY_PREVIOUS", hide_env_values = true)]
    pub action_signing_key_previous: Option<String>,

    /// Action token lifetime in seconds (max 60)
    #[arg(long, env = "ACTION_TOKEN_TTL_SECONDS", default_value = "60")]
    pub action_token_ttl_seconds: i64,
}

impl WorkerConfig {
    /// Build the signed HTTP client, failing fast on weak keys.
    pub fn client(&self) -> Result<HttpWorkerClient, SignerError> {
        let key = SigningKey::new(
            self.action_signing_key.clone(),
            self.action_signing_key_previous.clone(),
        )?;

        Ok(HttpWorkerClient::new(
            self.worker_base_url.clone(),
            key,
            self.action_token_ttl_seconds,
        ))
    }
}
