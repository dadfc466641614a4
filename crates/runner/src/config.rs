//! Runner configuration.

use std::path::PathBuf;

use clap::Parser;
use trellis_app::signer::{SignerError, SigningKey};

/// Trellis Runner configuration
#[derive(Debug, Parser)]
#[command(name = "trellis-runner", about = "Trellis Runner", long_about = None)]
pub struct RunnerConfig {
    /// Server host address
    #[arg(short = 'H', long, env = "RUNNER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "RUNNER_PORT", default_value = "8600")]
    pub port: u16,

    /// Default log filter when `RUST_LOG` is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// `PostgreSQL` connection string backing the event bus
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Action token verification key shared with the control plane
    #[arg(long, env = "ACTION_SIGNING_KEY", hide_env_values = true)]
    pub action_signing_key: String,

    /// Previous action key honoured during rotation
    #[arg(long, env = "ACTION_SIGNING_KEY_PREVIOUS", hide_env_values = true)]
    pub action_signing_key_previous: Option<String>,

    /// Directory holding one subdirectory per tenant
    #[arg(long, env = "TENANT_ROOT", default_value = "/opt/trellis/tenants")]
    pub tenant_root: PathBuf,

    /// Container network tenant runtimes attach to
    #[arg(long, env = "TENANT_NETWORK", default_value = "runner_internal")]
    pub tenant_network: String,

    /// Fallback runtime image when a request carries no override
    #[arg(long, env = "NEXUS_IMAGE", default_value = "")]
    pub nexus_image: String,

    /// Port the runtime's bridge WebSocket listens on
    #[arg(long, env = "BRIDGE_PORT", default_value = "8765")]
    pub bridge_port: u16,

    /// Container engine binary
    #[arg(long, env = "DOCKER_BIN", default_value = "docker")]
    pub docker_bin: String,

    /// Outer deadline for a single engine invocation, in seconds
    #[arg(long, env = "ENGINE_DEADLINE_SECONDS", default_value = "120")]
    pub engine_deadline_seconds: u64,
}

impl RunnerConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the action verification key, failing fast on weak keys.
    pub fn verify_key(&self) -> Result<SigningKey, SignerError> {
        SigningKey::new(
            self.action_signing_key.clone(),
            self.action_signing_key_previous.clone(),
        )
    }
}
