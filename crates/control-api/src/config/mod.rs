//! Server configuration module

use clap::Parser;

use crate::config::{
    auth::SessionConfig,
    db::DatabaseConfig,
    observability::LoggingConfig,
    runtime::RuntimeImageConfig,
    server::ServerRuntimeConfig,
    worker::WorkerConfig,
};

pub(crate) mod auth;
pub(crate) mod db;
pub(crate) mod observability;
pub(crate) mod runtime;
pub(crate) mod server;
pub(crate) mod worker;

/// Trellis Control API Server configuration
#[derive(Debug, Parser)]
#[command(name = "trellis-control", about = "Trellis Control API Server", long_about = None)]
pub struct ServerConfig {
    /// Server network settings.
    #[command(flatten)]
    pub server: ServerRuntimeConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Application database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Session token settings.
    #[command(flatten)]
    pub auth: SessionConfig,

    /// Runner dispatch settings.
    #[command(flatten)]
    pub worker: WorkerConfig,

    /// Tenant runtime image settings.
    #[command(flatten)]
    pub runtime: RuntimeImageConfig,
}

impl ServerConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Get the socket address for binding
    #[must_use]
    pub fn socket_addr(&self) -> String {
        self.server.socket_addr()
    }
}
