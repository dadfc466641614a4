//! Put Skill Handler

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
        collect_apply_config, emit, errors::skills_error, fail_worker,
        handlers::skills_index::SkillResponse, owned_tenant, parse_tenant_id,
    },
};
use crate::worker::WorkerClient as _;
use trellis_app::domain::skills::SkillsService as _;

/// Put Skill Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SkillPutRequest {
    pub content: String,
}

/// Put Skill Handler
#[endpoint(
    tags("skills"),
    summary = "Put Skill",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "New active revision"),
        (status_code = StatusCode::BAD_REQUEST, description = "Malformed skill id"),
    ),
)]
pub(crate) async fn handler(
    tenant_id: PathParam<String>,
    skill_id: PathParam<String>,
    json: JsonBody<SkillPutRequest>,
    depot: &mut Depot,
) -> Result<Json<SkillResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let tenant_id = parse_tenant_id(&tenant_id.into_inner())?;

    let skill_id = ArtifactName::parse(&skill_id.into_inner())
        .map_err(|_| ApiError::bad_request("invalid_skill_id", "Malformed skill id"))?;

    owned_tenant(&state, &tenant_id, user.id).await?;

    let revision = state
        .app
        .skills
        .put(&tenant_id, &skill_id, &json.into_inner().content)
        .await
        .map_err(|error| skills_error(&error))?;

    let apply = collect_apply_config(&state, &tenant_id, None).await?;

    if let Err(error) = state.worker.apply_config(&tenant_id, apply).await {
        return Err(fail_worker(&state, &tenant_id, "apply_config", &error).await);
    }

    emit(
        &state,
        &tenant_id,
        EventKind::ConfigApplied {
            revision: None,
            prompt: None,
            skill_id: Some(skill_id.to_string()),
        },
    )
    .await;

    Ok(Json(revision.into()))
}
