//! Runtime Stop Handler

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

/// Runtime Stop Handler
///
/// Stops the container; volumes and pairing session are retained.
#[endpoint(
    tags("tenants"),
    summary = "Stop Runtime",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::ACCEPTED, description = "Stop dispatched"),
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

    if let Err(error) = state.worker.stop(&tenant_id).await {
        return Err(fail_worker(&state, &tenant_id, "stop", &error).await);
    }

    state
        .app
        .tenants
        .update_states(
            &tenant_id,
            Some(TenantState::Paused),
            Some(TenantState::Paused),
        )
        .await
        .or_500("failed to record paused state")?;

    emit(
        &state,
        &tenant_id,
        EventKind::RuntimeStatus {
            state: TenantState::Paused,
            status: None,
        },
    )
    .await;

    res.status_code(StatusCode::ACCEPTED);

    Ok(Json(OperationAccepted::new(&tenant_id, "stop")))
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
    async fn test_stop_pauses_tenant() -> TestResult {
        let mut tenants = MockTenantsService::new();

        tenants
            .expect_tenant_for_owner()
            .once()
            .return_once(|id, owner| Ok(make_tenant(id, owner)));

        tenants
            .expect_update_states()
            .once()
            .withf(|_, desired, actual| {
                *desired == Some(TenantState::Paused) && *actual == Some(TenantState::Paused)
            })
            .return_once(|id, _, _| Ok(make_tenant(id, 1)));

        let mut worker = MockWorkerClient::new();

        worker.expect_stop().once().return_once(|_| Ok(()));

        let mut sink = MockEventSink::new();

        sink.expect_publish()
            .once()
            .withf(|_, kind| {
                matches!(
                    kind,
                    EventKind::RuntimeStatus {
                        state: TenantState::Paused,
                        ..
                    }
                )
            })
            .return_once(|_, _| Ok(1));

        let service = tenants_service(
            StateBuilder::new().tenants(tenants).worker(worker).sink(sink),
            Router::with_path("tenants/{tenant_id}/runtime/stop").post(handler),
        );

        let res = TestClient::post(format!(
            "http://example.com/tenants/{TEST_TENANT_ID}/runtime/stop"
        ))
        .send(&service)
        .await;

        assert_eq!(res.status_code, Some(StatusCode::ACCEPTED));

        Ok(())
    }
}
