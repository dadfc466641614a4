//! Tenant Setup Handler

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};
use trellis_app::domain::{
    configs::{keys, records::EnvMap},
    events::types::EventKind,
    tenants::{
        TenantsServiceError,
        data::{NewArtifact, NewTenant},
        records::{TenantId, TenantState},
    },
};

use crate::{
    assistant_defaults::{PROMPT_DEFAULTS, SKILL_DEFAULTS},
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{emit, require_nexus_image},
    worker::{PromptBody, ProvisionBody, SkillBody},
};
use crate::worker::WorkerClient as _;
use trellis_app::domain::tenants::TenantsService as _;

/// Base env every tenant runtime starts with.
const BASE_ENV: [(&str, &str); 5] = [
    ("NEXUS_CLI_ENABLED", "false"),
    ("NEXUS_CONFIG_DIR", "/data/config"),
    ("NEXUS_DATA_DIR", "/data/state"),
    ("NEXUS_PROMPTS_DIR", "/data/config/prompts"),
    ("NEXUS_SKILLS_DIR", "/data/config/skills"),
];

const BRIDGE_SECRET_BYTES: usize = 24;

/// Tenant Setup Request
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub(crate) struct TenantSetupRequest {
    /// Extra config keys merged over the base env.
    #[serde(default)]
    pub initial_config: Option<EnvMap>,
}

/// Tenant Setup Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct TenantSetupResponse {
    pub id: String,
}

/// Tenant Setup Handler
///
/// Creates the caller's single tenant: the tenant row, config revision 1,
/// the managed default prompts and skills, and a provision dispatch to the
/// runner. A second setup returns 409 naming the existing tenant.
#[endpoint(
    tags("tenants"),
    summary = "Set Up Tenant",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::CREATED, description = "Tenant created"),
        (status_code = StatusCode::CONFLICT, description = "User already owns a tenant"),
        (status_code = StatusCode::BAD_REQUEST, description = "Missing model-provider key or invalid image"),
    ),
)]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<TenantSetupResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let body: TenantSetupRequest = req.parse_json().await.unwrap_or_default();

    if let Some(existing) = state
        .app
        .tenants
        .tenant_by_owner(user.id)
        .await
        .or_500("failed to look up owner tenant")?
    {
        return Err(ApiError::tenant_already_exists(existing.id.as_str()));
    }

    let nexus_image = require_nexus_image(&state)?;

    let mut initial_env: EnvMap = BASE_ENV
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();

    if let Some(overrides) = body.initial_config {
        for key in overrides.keys() {
            if !keys::is_valid_key(key) {
                return Err(
                    ApiError::bad_request("invalid_config_key", "Malformed config key")
                        .with("key", key.clone()),
                );
            }
        }

        initial_env.extend(overrides);
    }

    if !keys::has_openrouter_api_key(&initial_env) {
        return Err(ApiError::openrouter_key_required());
    }

    let tenant_id = TenantId::generate();
    let bridge_shared_secret = generate_bridge_secret();

    let prompts: Vec<NewArtifact> = PROMPT_DEFAULTS
        .iter()
        .map(|(name, content)| NewArtifact {
            name: (*name).to_string(),
            content: (*content).to_string(),
        })
        .collect();

    let skills: Vec<NewArtifact> = SKILL_DEFAULTS
        .iter()
        .map(|(name, content)| NewArtifact {
            name: (*name).to_string(),
            content: (*content).to_string(),
        })
        .collect();

    let tenant = match state
        .app
        .tenants
        .create_tenant(NewTenant {
            id: tenant_id,
            owner_user_id: user.id,
            initial_env: initial_env.clone(),
            prompts: prompts.clone(),
            skills: skills.clone(),
        })
        .await
    {
        Ok(tenant) => tenant,
        // Lost a race with another request from the same user.
        Err(TenantsServiceError::AlreadyExists) => {
            let existing = state
                .app
                .tenants
                .tenant_by_owner(user.id)
                .await
                .or_500("failed to look up owner tenant")?
                .ok_or_else(ApiError::internal)?;

            return Err(ApiError::tenant_already_exists(existing.id.as_str()));
        }
        Err(error) => return Err(crate::tenants::errors::tenants_error(&error)),
    };

    let mut runtime_env = initial_env;
    runtime_env.insert(
        "BRIDGE_SHARED_SECRET".to_string(),
        bridge_shared_secret.clone(),
    );

    let provision = ProvisionBody {
        tenant_id: tenant.id.to_string(),
        nexus_image,
        runtime_env,
        bridge_shared_secret,
        prompts: prompts
            .into_iter()
            .map(|artifact| PromptBody {
                name: artifact.name,
                content: artifact.content,
            })
            .collect(),
        skills: skills
            .into_iter()
            .map(|artifact| SkillBody {
                skill_id: artifact.name,
                content: artifact.content,
            })
            .collect(),
    };

    match state.worker.provision(&tenant.id, provision).await {
        Ok(()) => {
            state
                .app
                .tenants
                .update_states(
                    &tenant.id,
                    Some(TenantState::Running),
                    Some(TenantState::PendingPairing),
                )
                .await
                .or_500("failed to record provisioned state")?;

            emit(
                &state,
                &tenant.id,
                EventKind::RuntimeStatus {
                    state: TenantState::PendingPairing,
                    status: None,
                },
            )
            .await;
        }
        // The tenant exists either way; provisioning is retried by the next
        // start or reconcile pass.
        Err(error) => {
            state
                .app
                .tenants
                .record_error(&tenant.id, &format!("{}: {}", error.code, error.message))
                .await
                .or_500("failed to record provision error")?;

            emit(
                &state,
                &tenant.id,
                EventKind::RuntimeError {
                    error: Some(error.code.clone()),
                    message: error.message.clone(),
                },
            )
            .await;
        }
    }

    res.status_code(StatusCode::CREATED);

    Ok(Json(TenantSetupResponse {
        id: tenant.id.to_string(),
    }))
}

fn generate_bridge_secret() -> String {
    let mut bytes = [0_u8; BRIDGE_SECRET_BYTES];

    OsRng.fill_bytes(&mut bytes);

    URL_SAFE_NO_PAD.encode(bytes)
}
