//! Patch Config Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::{JsonBody, PathParam}},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use trellis_app::domain::{
    configs::{ConfigPatch, keys, records::EnvMap},
    events::types::EventKind,
};

use crate::{
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{
        collect_apply_config, emit, errors::configs_error, fail_worker, handlers::config_get::ConfigResponse,
        owned_tenant, parse_tenant_id,
    },
};
use crate::worker::WorkerClient as _;
use trellis_app::domain::configs::ConfigsService as _;

/// Patch Config Request
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub(crate) struct ConfigPatchRequest {
    #[serde(default)]
    pub values: EnvMap,

    #[serde(default)]
    pub remove_keys: Vec<String>,
}

/// Patch Config Handler
///
/// Writes and activates the next revision, pushes the merged artifact set to
/// the runner, then emits `config.applied`. A failed push leaves the stored
/// revision in place for the next restart or reconcile to pick up.
#[endpoint(
    tags("config"),
    summary = "Patch Config",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "New active revision"),
        (status_code = StatusCode::BAD_REQUEST, description = "Malformed config key"),
    ),
)]
pub(crate) async fn handler(
    tenant_id: PathParam<String>,
    json: JsonBody<ConfigPatchRequest>,
    depot: &mut Depot,
) -> Result<Json<ConfigResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let tenant_id = parse_tenant_id(&tenant_id.into_inner())?;

    owned_tenant(&state, &tenant_id, user.id).await?;

    let body = json.into_inner();

    let outcome = state
        .app
        .configs
        .patch(
            &tenant_id,
            ConfigPatch {
                values: body.values,
                remove_keys: body.remove_keys,
            },
        )
        .await
        .map_err(|error| configs_error(&error))?;

    if !outcome.changed {
        return Ok(Json(outcome.revision.into()));
    }

    let revision = outcome.revision.revision;

    // Sensitive values never reach the logs.
    tracing::debug!(
        tenant_id = %tenant_id,
        revision,
        env = ?keys::redact_env(&outcome.revision.env),
        "config revision written"
    );

    let apply = collect_apply_config(&state, &tenant_id, Some(revision)).await?;

    if let Err(error) = state.worker.apply_config(&tenant_id, apply).await {
        return Err(fail_worker(&state, &tenant_id, "apply_config", &error).await);
    }

    emit(
        &state,
        &tenant_id,
        EventKind::ConfigApplied {
            revision: Some(revision),
            prompt: None,
            skill_id: None,
        },
    )
    .await;

    Ok(Json(outcome.revision.into()))
}
