//! Put Prompt Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::{JsonBody, PathParam}},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use trellis_app::domain::{events::types::EventKind, prompts::records::ArtifactName};

use crate::{
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{
        collect_apply_config, emit, errors::prompts_error, fail_worker,
        handlers::prompts_index::PromptResponse, owned_tenant, parse_tenant_id,
    },
};
use crate::worker::WorkerClient as _;
use trellis_app::domain::prompts::PromptsService as _;

/// Put Prompt Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct PromptPutRequest {
    pub content: String,
}

/// Put Prompt Handler
///
/// Writes revision n+1, pushes the merged artifact set to the runner, and
/// emits `config.applied` naming the prompt.
#[endpoint(
    tags("prompts"),
    summary = "Put Prompt",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "New active revision"),
        (status_code = StatusCode::BAD_REQUEST, description = "Malformed prompt name"),
    ),
)]
pub(crate) async fn handler(
    tenant_id: PathParam<String>,
    name: PathParam<String>,
    json: JsonBody<PromptPutRequest>,
    depot: &mut Depot,
) -> Result<Json<PromptResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let tenant_id = parse_tenant_id(&tenant_id.into_inner())?;

    let name = ArtifactName::parse(&name.into_inner())
        .map_err(|_| ApiError::bad_request("invalid_prompt_name", "Malformed prompt name"))?;

    owned_tenant(&state, &tenant_id, user.id).await?;

    let revision = state
        .app
        .prompts
        .put(&tenant_id, &name, &json.into_inner().content)
        .await
        .map_err(|error| prompts_error(&error))?;

    let apply = collect_apply_config(&state, &tenant_id, None).await?;

    if let Err(error) = state.worker.apply_config(&tenant_id, apply).await {
        return Err(fail_worker(&state, &tenant_id, "apply_config", &error).await);
    }

    emit(
        &state,
        &tenant_id,
        EventKind::ConfigApplied {
            revision: None,
            prompt: Some(name.to_string()),
            skill_id: None,
        },
    )
    .await;

    Ok(Json(revision.into()))
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use testresult::TestResult;
    use trellis_app::{
        bus::MockEventSink,
        domain::{
            configs::MockConfigsService,
            prompts::{MockPromptsService, records::PromptRevisionRecord},
            skills::MockSkillsService,
            tenants::MockTenantsService,
        },
    };

    use crate::{
        test_helpers::{
            StateBuilder, TEST_TENANT_ID, config_with_key, make_tenant, tenants_service,
        },
        worker::MockWorkerClient,
    };

    use super::*;

    #[tokio::test]
    async fn test_put_prompt_creates_revision_and_applies() -> TestResult {
        let mut tenants = MockTenantsService::new();

        tenants
            .expect_tenant_for_owner()
            .once()
            .return_once(|id, owner| Ok(make_tenant(id, owner)));

        let mut prompts = MockPromptsService::new();

        prompts
            .expect_put()
            .once()
            .withf(|_, name, content| name.as_str() == "system-prompt" && content == "be terse")
            .return_once(|id, name, content| {
                Ok(PromptRevisionRecord {
                    tenant_id: id.clone(),
                    name: name.clone(),
                    revision: 2,
                    content: content.to_string(),
                    is_active: true,
                    created_at: Timestamp::UNIX_EPOCH,
                })
            });

        prompts.expect_list_active().once().return_once(|_| Ok(vec![]));

        let mut configs = MockConfigsService::new();

        configs
            .expect_active_config()
            .once()
            .return_once(|id| Ok(config_with_key(id)));

        let mut skills = MockSkillsService::new();

        skills.expect_list_active().once().return_once(|_| Ok(vec![]));

        let mut worker = MockWorkerClient::new();

        worker.expect_apply_config().once().return_once(|_, _| Ok(()));

        let mut sink = MockEventSink::new();

        sink.expect_publish()
            .once()
            .withf(|_, kind| {
                matches!(kind, EventKind::ConfigApplied { prompt: Some(name), .. } if name == "system-prompt")
            })
            .return_once(|_, _| Ok(1));

        let service = tenants_service(
            StateBuilder::new()
                .tenants(tenants)
                .configs(configs)
                .prompts(prompts)
                .skills(skills)
                .worker(worker)
                .sink(sink),
            Router::with_path("tenants/{tenant_id}/prompts/{name}").put(handler),
        );

        let mut res = TestClient::put(format!(
            "http://example.com/tenants/{TEST_TENANT_ID}/prompts/system-prompt"
        ))
        .json(&json!({ "content": "be terse" }))
        .send(&service)
        .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: PromptResponse = res.take_json().await?;

        assert_eq!(body.revision, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_traversal_name_is_rejected() -> TestResult {
        let mut prompts = MockPromptsService::new();

        prompts.expect_put().never();

        let service = tenants_service(
            StateBuilder::new().prompts(prompts),
            Router::with_path("tenants/{tenant_id}/prompts/{name}").put(handler),
        );

        let res = TestClient::put(format!(
            "http://example.com/tenants/{TEST_TENANT_ID}/prompts/..%2Fetc"
        ))
        .json(&json!({ "content": "x" }))
        .send(&service)
        .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }
}
