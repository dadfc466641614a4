//! Graceful shutdown signal handling

use std::io;

use salvo::server::ServerHandle;
use thiserror::Error;
use tokio::signal;
use tracing::info;

#[derive(Debug, Error)]
pub(crate) enum ShutdownSignalError {
    #[error("failed to install Ctrl+C handler: {0}")]
    CtrlC(#[source] io::Error),

    #[cfg(unix)]
    #[error("failed to install SIGTERM handler: {0}")]
    SigTerm(#[source] io::Error),
}

/// Wait for Ctrl+C or SIGTERM, then stop the server gracefully. Tenant
/// containers keep running; the next runner process re-attaches to them on
/// its first reconcile pass.
pub(crate) async fn listen(handle: ServerHandle) -> Result<(), ShutdownSignalError> {
    let signal = wait_for_signal().await?;

    info!("{signal} received, stopping runner");

    handle.stop_graceful(None);

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str, ShutdownSignalError> {
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(ShutdownSignalError::SigTerm)?;

    tokio::select! {
        result = signal::ctrl_c() => {
            result.map_err(ShutdownSignalError::CtrlC)?;
            Ok("ctrl_c")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str, ShutdownSignalError> {
    signal::ctrl_c()
        .await
        .map_err(ShutdownSignalError::CtrlC)?;

    Ok("ctrl_c")
}
