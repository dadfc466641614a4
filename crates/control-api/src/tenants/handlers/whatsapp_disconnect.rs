//! WhatsApp Disconnect Handler

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

/// WhatsApp Disconnect Handler
///
/// Drops the pairing session. The runner wipes the session volume and
/// restarts the runtime, so the next emitted state is pending_pairing.
#[endpoint(
    tags("tenants"),
    summary = "Disconnect WhatsApp",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::ACCEPTED, description = "Disconnect dispatched"),
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

    if let Err(error) = state.worker.whatsapp_disconnect(&tenant_id).await {
        return Err(fail_worker(&state, &tenant_id, "whatsapp_disconnect", &error).await);
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
        .or_500("failed to record disconnected state")?;

    emit(
        &state,
        &tenant_id,
        EventKind::WhatsappDisconnected {
            reason: Some("requested".to_string()),
        },
    )
    .await;

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

    Ok(Json(OperationAccepted::new(&tenant_id, "whatsapp_disconnect")))
}

#[cfg(test)]
mod tests {
    use salvo::test::TestClient;
    use testresult::TestResult;
    use trellis_app::{bus::MockEventSink, domain::tenants::MockTenantsService};

    use crate::{
        test_helpers::{StateBuilder, TEST_TENANT_ID, make_tenant, tenants_service},
        worker::MockWorkerClient,
    };

    use super::*;

    #[tokio::test]
    async fn test_disconnect_emits_disconnected_then_pending_pairing() -> TestResult {
        let mut tenants = MockTenantsService::new();

        tenants
            .expect_tenant_for_owner()
            .once()
            .return_once(|id, owner| Ok(make_tenant(id, owner)));

        tenants
            .expect_update_states()
            .once()
            .return_once(|id, _, _| Ok(make_tenant(id, 1)));

        let mut worker = MockWorkerClient::new();

        worker
            .expect_whatsapp_disconnect()
            .once()
            .return_once(|_| Ok(()));

        let mut sink = MockEventSink::new();
        let mut order = mockall::Sequence::new();

        sink.expect_publish()
            .once()
            .in_sequence(&mut order)
            .withf(|_, kind| matches!(kind, EventKind::WhatsappDisconnected { .. }))
            .return_once(|_, _| Ok(1));

        sink.expect_publish()
            .once()
            .in_sequence(&mut order)
            .withf(|_, kind| {
                matches!(
                    kind,
                    EventKind::RuntimeStatus {
                        state: TenantState::PendingPairing,
                        ..
                    }
                )
            })
            .return_once(|_, _| Ok(2));

        let service = tenants_service(
            StateBuilder::new().tenants(tenants).worker(worker).sink(sink),
            Router::with_path("tenants/{tenant_id}/whatsapp/disconnect").post(handler),
        );

        let res = TestClient::post(format!(
            "http://example.com/tenants/{TEST_TENANT_ID}/whatsapp/disconnect"
        ))
        .send(&service)
        .await;

        assert_eq!(res.status_code, Some(StatusCode::ACCEPTED));

        Ok(())
    }
}
