//! Tenant Status Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use trellis_app::domain::tenants::records::{TenantRecord, TenantState};

use crate::{
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{owned_tenant, parse_tenant_id},
};
use crate::worker::WorkerClient as _;
use trellis_app::domain::tenants::TenantsService as _;

/// Tenant Status Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct TenantStatusResponse {
    pub tenant_id: String,
    pub desired_state: String,
    pub actual_state: String,
    pub last_heartbeat: Option<String>,
    pub last_error: Option<String>,

    /// Engine-reported uptime text while the container runs.
    pub uptime: Option<String>,
}

impl TenantStatusResponse {
    fn from_record(record: &TenantRecord, uptime: Option<String>) -> Self {
        Self {
            tenant_id: record.id.to_string(),
            desired_state: record.desired_state.to_string(),
            actual_state: record.actual_state.to_string(),
            last_heartbeat: record.last_heartbeat.map(|at| at.to_string()),
            last_error: record.last_error.clone(),
            uptime,
        }
    }
}

/// Tenant Status Handler
///
/// Merges the stored runtime state with a live worker probe. When the worker
/// is unreachable the last known state is preserved rather than invented.
#[endpoint(
    tags("tenants"),
    summary = "Tenant Status",
    security(("bearer_auth" = []))
)]
pub(crate) async fn handler(
    tenant_id: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<TenantStatusResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let tenant_id = parse_tenant_id(&tenant_id.into_inner())?;
    let mut record = owned_tenant(&state, &tenant_id, user.id).await?;
    let mut uptime = None;

    if let Ok(health) = state.worker.health(&tenant_id).await {
        let projected = if health.container_running {
            uptime = Some(health.status_text);

            // Keep event-projected states (for example pending_pairing)
            // instead of forcing running.
            (matches!(
                record.actual_state,
                TenantState::Provisioning | TenantState::Paused
            ) && record.desired_state == TenantState::Running)
                .then_some(TenantState::Running)
        } else if !matches!(
            record.actual_state,
            TenantState::Error | TenantState::Deleted | TenantState::Provisioning
        ) {
            Some(TenantState::Paused)
        } else {
            None
        };

        record = state
            .app
            .tenants
            .update_states(&tenant_id, None, projected)
            .await
            .or_500("failed to record observed state")?;
    }

    Ok(Json(TenantStatusResponse::from_record(&record, uptime)))
}
