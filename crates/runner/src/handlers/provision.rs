//! Provision Handler

use salvo::prelude::*;
use serde::Deserialize;
use trellis_app::domain::{
    configs::records::EnvMap,
    events::types::EventKind,
    tenants::records::TenantState,
};

use crate::{
    auth::guarded_tenant,
    driver::{ProvisionSpec, RuntimeDriver},
    errors::WorkerApiError,
    handlers::{GenericResponse, fail_driver, publish, worker_state},
};
use crate::monitor::BridgeMonitors as _;

#[derive(Debug, Deserialize)]
pub(crate) struct PromptItem {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SkillItem {
    pub skill_id: String,
    pub content: String,
}

/// Provision Request
#[derive(Debug, Deserialize)]
pub(crate) struct ProvisionRequest {
    pub tenant_id: String,
    pub nexus_image: Option<String>,
    pub runtime_env: EnvMap,
    pub bridge_shared_secret: String,
    #[serde(default)]
    pub prompts: Vec<PromptItem>,
    #[serde(default)]
    pub skills: Vec<SkillItem>,
}

/// Provision Handler
///
/// Creates the tenant's storage and topology and brings the runtime up in
/// pending-pairing mode. Idempotent: re-provisioning rewrites the same
/// files and `compose up` converges on the running state.
#[handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
) -> Result<Json<GenericResponse>, WorkerApiError> {
    let state = worker_state(depot)?;
    let tenant = guarded_tenant(depot)?;

    let body: ProvisionRequest = req
        .parse_json()
        .await
        .map_err(|_| WorkerApiError::bad_request("invalid_body", "Malformed provision body"))?;

    if body.tenant_id != tenant.as_str() {
        return Err(WorkerApiError::bad_request(
            "tenant_id_mismatch",
            "tenant_id mismatch",
        ));
    }

    let spec = ProvisionSpec {
        nexus_image: body.nexus_image,
        runtime_env: body.runtime_env,
        bridge_shared_secret: body.bridge_shared_secret,
        prompts: body
            .prompts
            .into_iter()
            .map(|item| (item.name, item.content))
            .collect(),
        skills: body
            .skills
            .into_iter()
            .map(|item| (item.skill_id, item.content))
            .collect(),
    };

    let _lock = state.locks.acquire(&tenant).await;

    if let Err(error) = state.driver.provision(&tenant, spec).await {
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

    Ok(GenericResponse::json(&tenant, "provisioned"))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use testresult::TestResult;
    use trellis_app::bus::MockEventSink;

    use crate::{
        driver::MockRuntimeDriver,
        test_helpers::{WorkerStateBuilder, internal_service, test_tenant, token_for},
    };
    use trellis_app::signer::Action;

    use super::*;

    #[tokio::test]
    async fn test_provision_materialises_and_reports_pending_pairing() -> TestResult {
        let mut driver = MockRuntimeDriver::new();

        driver
            .expect_provision()
            .once()
            .withf(|_, spec| {
                spec.bridge_shared_secret == "secret" && spec.prompts.len() == 1
            })
            .return_once(|_, _| Ok(()));

        driver
            .expect_bridge_ws_url()
            .returning(|id| format!("ws://tenant_{id}_runtime:8765"));

        let mut sink = MockEventSink::new();

        sink.expect_publish()
            .once()
            .withf(|_, kind| {
                matches!(
                    kind,
                    EventKind::RuntimeStatus {
                        state: TenantState::PendingPairing,
                        ..
                    }
                )
            })
            .return_once(|_, _| Ok(1));

        let service = internal_service(
            WorkerStateBuilder::new().driver(driver).sink(sink),
            Action::Provision,
            Router::with_path("internal/tenants/{tenant_id}/provision").post(handler),
        );

        let mut res = TestClient::post(format!(
            "http://example.com/internal/tenants/{}/provision",
            test_tenant()
        ))
        .add_header(
            "authorization",
            format!("Bearer {}", token_for(Action::Provision)),
            true,
        )
        .json(&json!({
            "tenant_id": test_tenant().as_str(),
            "nexus_image": "ghcr.io/trellis/nexus-runtime:sha-abc",
            "runtime_env": { "NEXUS_OPENROUTER_API_KEY": "sk-test" },
            "bridge_shared_secret": "secret",
            "prompts": [{ "name": "system-prompt", "content": "hi" }],
            "skills": [],
        }))
        .send(&service)
        .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: GenericResponse = res.take_json().await?;

        assert_eq!(body.detail, "provisioned");

        Ok(())
    }

    #[tokio::test]
    async fn test_tenant_id_mismatch_is_rejected() -> TestResult {
        let service = internal_service(
            WorkerStateBuilder::new(),
            Action::Provision,
            Router::with_path("internal/tenants/{tenant_id}/provision").post(handler),
        );

        let mut res = TestClient::post(format!(
            "http://example.com/internal/tenants/{}/provision",
            test_tenant()
        ))
        .add_header(
            "authorization",
            format!("Bearer {}", token_for(Action::Provision)),
            true,
        )
        .json(&json!({
            "tenant_id": "ffff000000000001",
            "runtime_env": {},
            "bridge_shared_secret": "secret",
        }))
        .send(&service)
        .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        let body: serde_json::Value = res.take_json().await?;

        assert_eq!(body["detail"]["error"], "tenant_id_mismatch");

        Ok(())
    }
}
