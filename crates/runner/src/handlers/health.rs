//! Tenant Health Handler

use salvo::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    auth::guarded_tenant,
    errors::WorkerApiError,
    handlers::worker_state,
};
use crate::monitor::BridgeMonitors as _;
use crate::driver::RuntimeDriver as _;

/// Tenant Health Response
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct HealthResponse {
    pub tenant_id: String,
    pub exists: bool,
    pub container_running: bool,
    pub status_text: String,
    pub engine_available: bool,
    pub engine_status: String,
    pub active_monitors: usize,
    pub last_reconcile_at: Option<String>,
    pub pair_baseline_event_id: Option<i64>,
}

/// Tenant Health Handler
///
/// State is read from the engine on every call, never from memory.
#[handler]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<HealthResponse>, WorkerApiError> {
    let state = worker_state(depot)?;
    let tenant = guarded_tenant(depot)?;

    let health = state
        .driver
        .health(&tenant)
        .await
        .map_err(|error| WorkerApiError::from(&error))?;

    Ok(Json(HealthResponse {
        tenant_id: tenant.to_string(),
        exists: health.exists,
        container_running: health.container_running,
        status_text: health.status_text,
        engine_available: health.engine_available,
        engine_status: health.engine_status,
        active_monitors: state.monitors.active_count().await,
        last_reconcile_at: state
            .reconciler
            .last_reconcile_at()
            .await
            .map(|at| at.to_string()),
        pair_baseline_event_id: state.baselines.get(&tenant).await,
    }))
}
