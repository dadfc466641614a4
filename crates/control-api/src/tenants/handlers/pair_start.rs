//! Pairing Start Handler

use std::sync::Arc;

use salvo::{oapi::extract::PathParam, prelude::*};
use trellis_app::domain::{events::types::EventKind, tenants::records::TenantState};

use crate::{
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{
        OperationAccepted, emit, fail_worker, owned_tenant, parse_tenant_id, require_nexus_image,
        require_openrouter_key,
    },
};
use crate::worker::WorkerClient as _;
use trellis_app::domain::tenants::TenantsService as _;

/// Pairing Start Handler
///
/// The runner records the tenant's latest event id as the pairing baseline
/// and restarts the runtime into pending-pairing; any `whatsapp.qr` the
/// client sees with an id at or below its own baseline is stale.
#[endpoint(
    tags("tenants"),
    summary = "Start WhatsApp Pairing",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::ACCEPTED, description = "Pairing dispatched"),
        (status_code = StatusCode::BAD_REQUEST, description = "Missing model-provider key"),
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
    require_openrouter_key(&state, &tenant_id).await?;

    let image = require_nexus_image(&state)?;

    if let Err(error) = state.worker.pair_start(&tenant_id, Some(image)).await {
        return Err(fail_worker(&state, &tenant_id, "pair_start", &error).await);
    }

    state
        .app
        .tenants
        .update_states(
            &tenant_id,
            Some(TenantState::PendingPairing),
            Some(TenantState::PendingPairing),
        )
        .await
        .or_500("failed to record pairing state")?;

    emit(
        &state,
        &tenant_id,
        EventKind::RuntimeStatus {
            state: TenantState::PendingPairing,
            status: None,
        },
    )
    .await;

    res.status_code(StatusCode::ACCEPTED);

    Ok(Json(OperationAccepted::new(&tenant_id, "pair_start")))
}
