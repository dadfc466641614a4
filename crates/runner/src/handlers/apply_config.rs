//! Apply Config Handler

use salvo::prelude::*;
use serde::Deserialize;
use trellis_app::domain::{configs::records::EnvMap, events::types::EventKind};

use crate::{
    auth::guarded_tenant,
    driver::{ApplySpec, RuntimeDriver},
    errors::WorkerApiError,
    handlers::{
        GenericResponse, fail_driver, publish,
        provision::{PromptItem, SkillItem},
        worker_state,
    },
};
use crate::monitor::BridgeMonitors as _;

/// Apply Config Request
#[derive(Debug, Deserialize)]
pub(crate) struct ApplyConfigRequest {
    pub env: EnvMap,
    #[serde(default)]
    pub prompts: Vec<PromptItem>,
    #[serde(default)]
    pub skills: Vec<SkillItem>,
    pub config_revision: Option<i64>,
}

/// Apply Config Handler
///
/// Rewrites the env file and artifact files atomically with respect to the
/// tenant lock, restarts the runtime, and emits `config.applied`.
#[handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
) -> Result<Json<GenericResponse>, WorkerApiError> {
    let state = worker_state(depot)?;
    let tenant = guarded_tenant(depot)?;

    let body: ApplyConfigRequest = req
        .parse_json()
        .await
        .map_err(|_| WorkerApiError::bad_request("invalid_body", "Malformed apply-config body"))?;

    let spec = ApplySpec {
        env: body.env,
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

    if let Err(error) = state.driver.apply_config(&tenant, spec).await {
        return Err(fail_driver(&state.sink, &tenant, &error).await);
    }

    state.monitors.start(&tenant).await;

    publish(
        &state.sink,
        &tenant,
        EventKind::ConfigApplied {
            revision: body.config_revision,
            prompt: None,
            skill_id: None,
        },
    )
    .await;

    Ok(GenericResponse::json(&tenant, "config_applied"))
}

#[cfg(test)]
mod tests {
    use salvo::test::TestClient;
    use serde_json::json;
    use testresult::TestResult;
    use trellis_app::{bus::MockEventSink, signer::Action};

    use crate::{
        driver::MockRuntimeDriver,
        test_helpers::{WorkerStateBuilder, internal_service, test_tenant, token_for},
    };

    use super::*;

    #[tokio::test]
    async fn test_apply_config_rewrites_and_emits_revision() -> TestResult {
        let mut driver = MockRuntimeDriver::new();

        driver
            .expect_apply_config()
            .once()
            .withf(|_, spec| {
                spec.env.get("NEXUS_OPENROUTER_API_KEY").map(String::as_str) == Some("sk-test")
                    && spec.prompts.len() == 1
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
                    EventKind::ConfigApplied {
                        revision: Some(2),
                        ..
                    }
                )
            })
            .return_once(|_, _| Ok(1));

        let service = internal_service(
            WorkerStateBuilder::new().driver(driver).sink(sink),
            Action::ApplyConfig,
            Router::with_path("internal/tenants/{tenant_id}/apply-config").post(handler),
        );

        let res = TestClient::post(format!(
            "http://example.com/internal/tenants/{}/apply-config",
            test_tenant()
        ))
        .add_header(
            "authorization",
            format!("Bearer {}", token_for(Action::ApplyConfig)),
            true,
        )
        .json(&json!({
            "env": { "NEXUS_OPENROUTER_API_KEY": "sk-test" },
            "prompts": [{ "name": "system-prompt", "content": "hi" }],
            "skills": [],
            "config_revision": 2,
        }))
        .send(&service)
        .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        Ok(())
    }
}
