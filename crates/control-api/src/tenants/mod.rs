//! Tenant surface.

pub(crate) mod errors;
pub(crate) mod handlers;

use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;
use trellis_app::domain::{
    configs::keys,
    events::types::EventKind,
    tenants::records::{TenantId, TenantRecord},
};

use crate::{errors::ApiError, state::State, worker::WorkerError};
use trellis_app::bus::EventSink as _;
use trellis_app::domain::configs::ConfigsService as _;
use trellis_app::domain::prompts::PromptsService as _;
use trellis_app::domain::skills::SkillsService as _;
use trellis_app::domain::tenants::TenantsService as _;

/// 202 body for accepted lifecycle operations.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OperationAccepted {
    pub tenant_id: String,
    pub operation: String,
    pub accepted: bool,
}

impl OperationAccepted {
    pub(crate) fn new(tenant: &TenantId, operation: &str) -> Self {
        Self {
            tenant_id: tenant.to_string(),
            operation: operation.to_string(),
            accepted: true,
        }
    }
}

/// Parse a tenant id path segment.
pub(crate) fn parse_tenant_id(raw: &str) -> Result<TenantId, ApiError> {
    TenantId::parse(raw)
        .map_err(|_| ApiError::bad_request("invalid_tenant_id", "Malformed tenant id"))
}

/// Fetch the tenant, enforcing ownership. Cross-tenant access is forbidden
/// regardless of the path.
pub(crate) async fn owned_tenant(
    state: &State,
    tenant: &TenantId,
    user_id: i64,
) -> Result<TenantRecord, ApiError> {
    state
        .app
        .tenants
        .tenant_for_owner(tenant, user_id)
        .await
        .map_err(|error| errors::tenants_error(&error))
}

/// The runtime image, rejected while unset or a placeholder.
pub(crate) fn require_nexus_image(state: &State) -> Result<String, ApiError> {
    state
        .nexus_image
        .clone()
        .ok_or_else(ApiError::nexus_image_invalid)
}

/// Runtime start pre-condition: the model-provider key must be configured.
pub(crate) async fn require_openrouter_key(
    state: &State,
    tenant: &TenantId,
) -> Result<(), ApiError> {
    let active = state
        .app
        .configs
        .active_config(tenant)
        .await
        .map_err(|error| errors::configs_error(&error))?;

    if keys::has_openrouter_api_key(&active.env) {
        Ok(())
    } else {
        Err(ApiError::openrouter_key_required())
    }
}

/// Publish an event, logging instead of failing the request when the bus is
/// briefly unavailable. Events are projections of already-committed intent.
pub(crate) async fn emit(state: &State, tenant: &TenantId, kind: EventKind) {
    if let Err(error) = state.app.sink.publish(tenant, kind).await {
        warn!(tenant_id = %tenant, "failed to publish event: {error}");
    }
}

/// Assemble the full artifact set the runner materialises on apply-config:
/// the active env plus every active prompt and skill.
pub(crate) async fn collect_apply_config(
    state: &State,
    tenant: &TenantId,
    config_revision: Option<i64>,
) -> Result<crate::worker::ApplyConfigBody, ApiError> {
    let active = state
        .app
        .configs
        .active_config(tenant)
        .await
        .map_err(|error| errors::configs_error(&error))?;

    let prompts = state
        .app
        .prompts
        .list_active(tenant)
        .await
        .map_err(|error| errors::prompts_error(&error))?;

    let skills = state
        .app
        .skills
        .list_active(tenant)
        .await
        .map_err(|error| errors::skills_error(&error))?;

    Ok(crate::worker::ApplyConfigBody {
        env: active.env,
        prompts: prompts
            .into_iter()
            .map(|prompt| crate::worker::PromptBody {
                name: prompt.name.to_string(),
                content: prompt.content,
            })
            .collect(),
        skills: skills
            .into_iter()
            .map(|skill| crate::worker::SkillBody {
                skill_id: skill.skill_id.to_string(),
                content: skill.content,
            })
            .collect(),
        config_revision,
    })
}

/// Record a runner failure on the bus and surface it to the caller with the
/// runner's own status and code. Mutating worker failures are never
/// swallowed.
pub(crate) async fn fail_worker(
    state: &State,
    tenant: &TenantId,
    action: &str,
    error: &WorkerError,
) -> ApiError {
    emit(
        state,
        tenant,
        EventKind::RuntimeError {
            error: Some(error.code.clone()),
            message: format!("{action}: {}", error.message),
        },
    )
    .await;

    ApiError::from_worker(error)
}
