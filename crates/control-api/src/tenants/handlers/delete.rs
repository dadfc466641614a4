//! Tenant Delete Handler

use std::sync::Arc;

use salvo::{oapi::extract::PathParam, prelude::*};
use trellis_app::domain::{events::types::EventKind, tenants::records::TenantState};

use crate::{
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{OperationAccepted, emit, fail_worker, owned_tenant, parse_tenant_id},
};
use crate::worker::WorkerClient as _;
use trellis_app::domain::tenants::TenantsService as _;

/// Tenant Delete Handler
///
/// Terminal: the runner removes the container and both volumes; the tenant
/// row and its event history are retained in the deleted state.
#[endpoint(
    tags("tenants"),
    summary = "Delete Tenant",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::ACCEPTED, description = "Delete dispatched"),
    ),
)]
pub(crate) async fn handler(
    tenant_id: PathParam<String>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<OperationAccepted>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let tenant_id = parse_tenant_id(&tenant_id.into_inner())?;

    owned_tenant(&state, &tenant_id, user.id).await?;

    if let Err(error) = state.worker.delete(&tenant_id).await {
        return Err(fail_worker(&state, &tenant_id, "delete", &error).await);
    }

    emit(
        &state,
        &tenant_id,
        EventKind::RuntimeStatus {
            state: TenantState::Deleted,
            status: None,
        },
    )
    .await;

    state
        .app
        .tenants
        .update_states(
            &tenant_id,
            Some(TenantState::Deleted),
            Some(TenantState::Deleted),
        )
        .await
        .or_500("failed to record deleted state")?;

    res.status_code(StatusCode::ACCEPTED);

    Ok(Json(OperationAccepted::new(&tenant_id, "delete")))
}
