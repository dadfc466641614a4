//! Trellis Control API Server

use std::{process, sync::Arc};

use salvo::{
    affix_state::inject,
    oapi::{OpenApi, swagger_ui::SwaggerUi},
    prelude::*,
    trailing_slash::remove_slash,
};
use tracing::error;
use tracing_subscriber::EnvFilter;
use trellis_app::{bus::EventFanout, context::AppContext};

use crate::{config::ServerConfig, state::State};

mod assistant_defaults;
mod auth;
mod config;
mod errors;
mod events;
mod extensions;
mod router;
mod shutdown;
mod state;
mod tenants;
mod worker;

#[cfg(test)]
mod test_helpers;

/// Trellis Control API Server entry point
///
/// # Panics
///
/// Panics if the server fails to bind or serve requests
#[tokio::main]
pub async fn main() {
    // Load configuration from .env and CLI arguments
    let config = ServerConfig::load().unwrap_or_else(|e| {
        #[expect(
            clippy::print_stderr,
            reason = "logging not initialized yet, must use eprintln for config errors"
        )]
        {
            eprintln!("Configuration error: {e}");
        }

        process::exit(1);
    });

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level)),
        )
        .init();

    let addr = config.socket_addr();
    tracing::info!("Starting control api on {addr}");

    let listener = TcpListener::new(addr).bind().await;

    let (app, pool) = match AppContext::from_database_url(&config.database.database_url).await {
        Ok(built) => built,
        Err(db_error) => {
            error!("failed to initialise store: {db_error}");
            process::exit(1);
        }
    };

    let sessions = match config.auth.session_signer() {
        Ok(sessions) => sessions,
        Err(key_error) => {
            error!("invalid session signing key: {key_error}");
            process::exit(1);
        }
    };

    let worker = match config.worker.client() {
        Ok(worker) => Arc::new(worker) as Arc<dyn worker::WorkerClient>,
        Err(key_error) => {
            error!("invalid action signing key: {key_error}");
            process::exit(1);
        }
    };

    let fanout = EventFanout::new(pool);

    let state = State::build(app, Arc::new(fanout.clone()), worker, sessions, &config);

    // Fan committed events out to WebSocket subscribers.
    tokio::spawn(async move { fanout.run().await });

    let router = Router::new()
        .hoop(CatchPanic::new())
        .hoop(remove_slash())
        .hoop(inject(state))
        .push(router::app_router());

    let doc = OpenApi::new("Trellis Control API", "0.1.0").merge_router(&router);

    let router = router
        .push(doc.into_router("/api-doc/openapi.json"))
        .push(SwaggerUi::new("/api-doc/openapi.json").into_router("docs"));

    let server = Server::new(listener);

    let handle = server.handle();

    // Listen for shutdown signal
    tokio::spawn(async move {
        if let Err(error) = shutdown::listen(handle).await {
            error!("failed to listen for shutdown signal: {error}");
        }
    });

    // Start serving requests
    server.serve(router).await;
}
