//! Assistant Bootstrap Handler

use std::collections::BTreeMap;
use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use trellis_app::domain::{
    events::types::EventKind,
    prompts::records::ArtifactName,
    tenants::records::TenantState,
};

use crate::{
    assistant_defaults::{ASSISTANT_DEFAULTS_VERSION, PROMPT_DEFAULTS, SKILL_DEFAULTS, needs_default},
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{
        collect_apply_config, emit, errors::{prompts_error, skills_error}, fail_worker,
        owned_tenant, parse_tenant_id,
    },
};
use crate::worker::WorkerClient as _;
use trellis_app::domain::prompts::PromptsService as _;
use trellis_app::domain::skills::SkillsService as _;
use trellis_app::domain::tenants::TenantsService as _;

/// Assistant Bootstrap Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct AssistantBootstrapResponse {
    pub tenant_id: String,
    pub applied: bool,
    pub version: String,
    pub restarted_runtime: bool,
    pub reason: String,
}

/// Assistant Bootstrap Handler
///
/// Idempotent, versioned application of the managed default prompts and
/// skills. Reports whether anything was applied and whether the runtime was
/// restarted by the config push.
#[endpoint(
    tags("tenants"),
    summary = "Bootstrap Assistant Defaults",
    security(("bearer_auth" = []))
)]
pub(crate) async fn handler(
    tenant_id: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<AssistantBootstrapResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let tenant_id = parse_tenant_id(&tenant_id.into_inner())?;
    let record = owned_tenant(&state, &tenant_id, user.id).await?;

    let version_changed =
        record.assistant_defaults_version.as_deref() != Some(ASSISTANT_DEFAULTS_VERSION);

    let active_prompts: BTreeMap<String, String> = state
        .app
        .prompts
        .list_active(&tenant_id)
        .await
        .map_err(|error| prompts_error(&error))?
        .into_iter()
        .map(|prompt| (prompt.name.to_string(), prompt.content))
        .collect();

    let active_skills: BTreeMap<String, String> = state
        .app
        .skills
        .list_active(&tenant_id)
        .await
        .map_err(|error| skills_error(&error))?
        .into_iter()
        .map(|skill| (skill.skill_id.to_string(), skill.content))
        .collect();

    let prompt_updates: Vec<&(&str, &str)> = PROMPT_DEFAULTS
        .iter()
        .filter(|(name, _)| {
            version_changed || needs_default(active_prompts.get(*name).map(String::as_str))
        })
        .filter(|(name, content)| active_prompts.get(*name).map(String::as_str) != Some(*content))
        .collect();

    let skill_updates: Vec<&(&str, &str)> = SKILL_DEFAULTS
        .iter()
        .filter(|(skill_id, _)| {
            version_changed || needs_default(active_skills.get(*skill_id).map(String::as_str))
        })
        .filter(|(skill_id, content)| {
            active_skills.get(*skill_id).map(String::as_str) != Some(*content)
        })
        .collect();

    if prompt_updates.is_empty() && skill_updates.is_empty() {
        if version_changed {
            state
                .app
                .tenants
                .set_defaults_version(&tenant_id, ASSISTANT_DEFAULTS_VERSION)
                .await
                .or_500("failed to record defaults version")?;
        }

        return Ok(Json(AssistantBootstrapResponse {
            tenant_id: tenant_id.to_string(),
            applied: false,
            version: ASSISTANT_DEFAULTS_VERSION.to_string(),
            restarted_runtime: false,
            reason: "already_bootstrapped".to_string(),
        }));
    }

    let mut applied_prompts = Vec::new();

    for (name, content) in &prompt_updates {
        let name = ArtifactName::parse(name)
            .map_err(|_| ApiError::log_internal("managed prompt name invalid", &name))?;

        state
            .app
            .prompts
            .put(&tenant_id, &name, content)
            .await
            .map_err(|error| prompts_error(&error))?;

        applied_prompts.push(name.to_string());
    }

    let mut applied_skills = Vec::new();

    for (skill_id, content) in &skill_updates {
        let skill_id = ArtifactName::parse(skill_id)
            .map_err(|_| ApiError::log_internal("managed skill id invalid", &skill_id))?;

        state
            .app
            .skills
            .put(&tenant_id, &skill_id, content)
            .await
            .map_err(|error| skills_error(&error))?;

        applied_skills.push(skill_id.to_string());
    }

    let restarted_runtime = matches!(
        record.actual_state,
        TenantState::Running | TenantState::PendingPairing | TenantState::Provisioning
    );

    let apply = collect_apply_config(&state, &tenant_id, None).await?;

    if let Err(error) = state.worker.apply_config(&tenant_id, apply).await {
        return Err(fail_worker(&state, &tenant_id, "assistant_bootstrap", &error).await);
    }

    state
        .app
        .tenants
        .set_defaults_version(&tenant_id, ASSISTANT_DEFAULTS_VERSION)
        .await
        .or_500("failed to record defaults version")?;

    emit(
        &state,
        &tenant_id,
        EventKind::BootstrapApplied {
            version: ASSISTANT_DEFAULTS_VERSION.to_string(),
            restarted_runtime,
            prompts: applied_prompts,
            skills: applied_skills,
        },
    )
    .await;

    Ok(Json(AssistantBootstrapResponse {
        tenant_id: tenant_id.to_string(),
        applied: true,
        version: ASSISTANT_DEFAULTS_VERSION.to_string(),
        restarted_runtime,
        reason: "applied_defaults".to_string(),
    }))
}
