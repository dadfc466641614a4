//! WhatsApp Disconnect Handler

use salvo::prelude::*;
use trellis_app::domain::events::types::EventKind;

use crate::{
    auth::guarded_tenant,
    errors::WorkerApiError,
    handlers::{GenericResponse, fail_driver, publish, worker_state},
};
use crate::monitor::BridgeMonitors as _;
use crate::driver::RuntimeDriver as _;

/// WhatsApp Disconnect Handler
///
/// Wipes the session volume and restarts the runtime; the state projection
/// of `whatsapp.disconnected` lands the tenant back in pending_pairing.
#[handler]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<GenericResponse>, WorkerApiError> {
    let state = worker_state(depot)?;
    let tenant = guarded_tenant(depot)?;

    let _lock = state.locks.acquire(&tenant).await;

    if let Err(error) = state.driver.whatsapp_disconnect(&tenant).await {
        return Err(fail_driver(&state.sink, &tenant, &error).await);
    }

    state.monitors.start(&tenant).await;

    publish(
        &state.sink,
        &tenant,
        EventKind::WhatsappDisconnected {
            reason: Some("disconnect_requested".to_string()),
        },
    )
    .await;

    Ok(GenericResponse::json(&tenant, "whatsapp_disconnected"))
}

#[cfg(test)]
mod tests {
    use salvo::test::TestClient;
    use testresult::TestResult;
    use trellis_app::{bus::MockEventSink, signer::Action};

    use crate::{
        driver::MockRuntimeDriver,
        test_helpers::{WorkerStateBuilder, internal_service, test_tenant, token_for},
    };

    use super::*;

    #[tokio::test]
    async fn test_disconnect_wipes_session_and_emits() -> TestResult {
        let mut driver = MockRuntimeDriver::new();

        driver
            .expect_whatsapp_disconnect()
            .once()
            .return_once(|_| Ok(()));

        driver
            .expect_bridge_ws_url()
            .returning(|id| format!("ws://tenant_{id}_runtime:8765"));

        let mut sink = MockEventSink::new();

        sink.expect_publish()
            .once()
            .withf(|_, kind| {
                matches!(
                    kind,
                    EventKind::WhatsappDisconnected { reason: Some(reason) } if reason == "disconnect_requested"
                )
            })
            .return_once(|_, _| Ok(1));

        let service = internal_service(
            WorkerStateBuilder::new().driver(driver).sink(sink),
            Action::WhatsappDisconnect,
            Router::with_path("internal/tenants/{tenant_id}/whatsapp/disconnect").post(handler),
        );

        let res = TestClient::post(format!(
            "http://example.com/internal/tenants/{}/whatsapp/disconnect",
            test_tenant()
        ))
        .add_header(
            "authorization",
            format!("Bearer {}", token_for(Action::WhatsappDisconnect)),
            true,
        )
        .send(&service)
        .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        Ok(())
    }
}
