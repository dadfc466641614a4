//! Stop Handler

use salvo::prelude::*;
use trellis_app::domain::{events::types::EventKind, tenants::records::TenantState};

use crate::{
    auth::guarded_tenant,
    errors::WorkerApiError,
    handlers::{GenericResponse, fail_driver, publish, worker_state},
};
use crate::monitor::BridgeMonitors as _;
use crate::driver::RuntimeDriver as _;

/// Stop Handler
///
/// Container stopped, volumes retained.
#[handler]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<GenericResponse>, WorkerApiError> {
    let state = worker_state(depot)?;
    let tenant = guarded_tenant(depot)?;

    let _lock = state.locks.acquire(&tenant).await;

    if let Err(error) = state.driver.stop(&tenant).await {
        return Err(fail_driver(&state.sink, &tenant, &error).await);
    }

    state.monitors.stop(&tenant).await;

    publish(
        &state.sink,
        &tenant,
        EventKind::RuntimeStatus {
            state: TenantState::Paused,
            status: None,
        },
    )
    .await;

    Ok(GenericResponse::json(&tenant, "stopped"))
}
