//! Trellis Runner
//!
//! Private lifecycle engine: receives signed action requests from the
//! control plane, materialises per-tenant container topologies on the local
//! engine, forwards bridge events onto the bus, and reconciles observed
//! state on startup and every thirty seconds.

use std::{process, sync::Arc, time::Duration};

use salvo::{affix_state::inject, prelude::*};
use tracing::error;
use tracing_subscriber::EnvFilter;
use trellis_app::{
    bus::{EventSink, PgEventPublisher},
    database,
    signer::Action,
};

use crate::{
    auth::ActionGuard,
    config::RunnerConfig,
    driver::{ComposeDriver, Engine, RuntimeDriver, TenantLayout},
    locks::TenantLocks,
    monitor::{BridgeMonitors, MonitorSet},
    reconcile::Reconciler,
    state::{PairBaselines, WorkerState},
};

mod auth;
mod config;
mod driver;
mod errors;
mod handlers;
mod locks;
mod monitor;
mod reconcile;
mod shutdown;
mod state;

#[cfg(test)]
mod test_helpers;

#[salvo::handler]
async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

fn internal_router(key: &trellis_app::signer::SigningKey) -> Router {
    let guard = |action: Action| ActionGuard::new(action, key.clone());

    Router::with_path("internal/tenants/{tenant_id}")
        .push(
            Router::with_path("provision")
                .hoop(guard(Action::Provision))
                .post(handlers::provision::handler),
        )
        .push(
            Router::with_path("start")
                .hoop(guard(Action::Start))
                .post(handlers::start::handler),
        )
        .push(
            Router::with_path("stop")
                .hoop(guard(Action::Stop))
                .post(handlers::stop::handler),
        )
        .push(
            Router::with_path("restart")
                .hoop(guard(Action::Restart))
                .post(handlers::restart::handler),
        )
        .push(
            Router::with_path("pair/start")
                .hoop(guard(Action::PairStart))
                .post(handlers::pair_start::handler),
        )
        .push(
            Router::with_path("apply-config")
                .hoop(guard(Action::ApplyConfig))
                .post(handlers::apply_config::handler),
        )
        .push(
            Router::with_path("whatsapp/disconnect")
                .hoop(guard(Action::WhatsappDisconnect))
                .post(handlers::whatsapp_disconnect::handler),
        )
        .push(
            Router::with_path("health")
                .hoop(guard(Action::Health))
                .get(handlers::health::handler),
        )
        .push(
            Router::new()
                .hoop(guard(Action::Delete))
                .delete(handlers::delete::handler),
        )
}

/// Trellis Runner entry point
///
/// Exits non-zero when configuration is invalid or the store backing the
/// bus is unreachable.
///
/// # Panics
///
/// Panics if the server fails to bind or serve requests
#[tokio::main]
pub async fn main() {
    let config = RunnerConfig::load().unwrap_or_else(|e| {
        #[expect(
            clippy::print_stderr,
            reason = "logging not initialized yet, must use eprintln for config errors"
        )]
        {
            eprintln!("Configuration error: {e}");
        }

        process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let verify_key = match config.verify_key() {
        Ok(key) => key,
        Err(key_error) => {
            error!("invalid action signing key: {key_error}");
            process::exit(1);
        }
    };

    let pool = match database::connect(&config.database_url).await {
        Ok(pool) => pool,
        Err(db_error) => {
            error!("failed to connect to event store: {db_error}");
            process::exit(1);
        }
    };

    let addr = config.socket_addr();
    tracing::info!("Starting runner on {addr}");

    let listener = TcpListener::new(addr).bind().await;

    let layout = TenantLayout::new(
        config.tenant_root.clone(),
        config.bridge_port,
        config.tenant_network.clone(),
    );

    let engine = Engine::new(
        config.docker_bin.clone(),
        Duration::from_secs(config.engine_deadline_seconds),
    );

    let driver: Arc<dyn RuntimeDriver> = Arc::new(ComposeDriver::new(
        layout,
        engine,
        config.nexus_image.clone(),
    ));

    let sink: Arc<dyn EventSink> = Arc::new(PgEventPublisher::new(pool));

    let monitors: Arc<dyn BridgeMonitors> =
        Arc::new(MonitorSet::new(Arc::clone(&driver), Arc::clone(&sink)));

    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&driver),
        Arc::clone(&sink),
        Arc::clone(&monitors),
    ));

    let state = Arc::new(WorkerState {
        driver,
        sink,
        monitors: Arc::clone(&monitors),
        locks: TenantLocks::new(),
        baselines: Arc::new(PairBaselines::new()),
        reconciler: Arc::clone(&reconciler),
    });

    // Startup and periodic reconciliation.
    tokio::spawn(async move { reconciler.run().await });

    let router = Router::new()
        .hoop(CatchPanic::new())
        .hoop(inject(state))
        .push(Router::with_path("healthz").get(healthz))
        .push(internal_router(&verify_key));

    let server = Server::new(listener);

    let handle = server.handle();

    tokio::spawn(async move {
        if let Err(signal_error) = shutdown::listen(handle).await {
            error!("failed to listen for shutdown signal: {signal_error}");
        }
    });

    server.serve(router).await;

    monitors.shutdown().await;
}
