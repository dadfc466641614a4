//! Restart Handler

use salvo::prelude::*;
use trellis_app::domain::{events::types::EventKind, tenants::records::TenantState};

use crate::{
    auth::guarded_tenant,
    errors::WorkerApiError,
    handlers::{GenericResponse, ImageOverride, fail_driver, publish, worker_state},
};
use crate::monitor::BridgeMonitors as _;
use crate::driver::RuntimeDriver as _;

/// Restart Handler
#[handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
) -> Result<Json<GenericResponse>, WorkerApiError> {
    let state = worker_state(depot)?;
    let tenant = guarded_tenant(depot)?;

    let body: ImageOverride = req.parse_json().await.unwrap_or_default();

    let _lock = state.locks.acquire(&tenant).await;

    if let Err(error) = state.driver.restart(&tenant, body.nexus_image).await {
        return Err(fail_driver(&state.sink, &tenant, &error).await);
    }

    state.monitors.start(&tenant).await;

    publish(
        &state.sink,
        &tenant,
        EventKind::RuntimeStatus {
            state: TenantState::Running,
            status: None,
        },
    )
    .await;

    Ok(GenericResponse::json(&tenant, "restarted"))
}
