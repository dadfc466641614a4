//! Pair Start Handler

use salvo::prelude::*;
use trellis_app::domain::{events::types::EventKind, tenants::records::TenantState};

use crate::{
    auth::guarded_tenant,
    errors::WorkerApiError,
    handlers::{GenericResponse, ImageOverride, fail_driver, publish, worker_state},
};
use crate::monitor::BridgeMonitors as _;
use crate::driver::RuntimeDriver as _;
use trellis_app::bus::EventSink as _;

/// Pair Start Handler
///
/// Records the tenant's latest event id as the pairing baseline, then
/// forces a fresh runtime: the session volume is wiped, so the restarted
/// bridge must publish a new QR, and every new event outranks the baseline
/// because ids are strictly increasing.
#[handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
) -> Result<Json<GenericResponse>, WorkerApiError> {
    let state = worker_state(depot)?;
    let tenant = guarded_tenant(depot)?;

    let body: ImageOverride = req.parse_json().await.unwrap_or_default();

    let _lock = state.locks.acquire(&tenant).await;

    let baseline = state
        .sink
        .latest_event_id(&tenant)
        .await
        .map_err(|_| WorkerApiError::internal())?;

    state.baselines.record(&tenant, baseline).await;

    if let Err(error) = state.driver.pair_start(&tenant, body.nexus_image).await {
        return Err(fail_driver(&state.sink, &tenant, &error).await);
    }

    state.monitors.start(&tenant).await;

    publish(
        &state.sink,
        &tenant,
        EventKind::RuntimeStatus {
            state: TenantState::PendingPairing,
            status: None,
        },
    )
    .await;

    Ok(GenericResponse::json(&tenant, "pairing_started"))
}
