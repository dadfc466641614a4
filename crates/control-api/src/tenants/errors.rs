//! Tenant surface error mapping.

use trellis_app::domain::{
    configs::ConfigsServiceError, events::EventsServiceError, prompts::PromptsServiceError,
    skills::SkillsServiceError, tenants::TenantsServiceError,
};

use crate::errors::ApiError;

pub(crate) fn tenants_error(error: &TenantsServiceError) -> ApiError {
    match error {
        TenantsServiceError::NotFound => ApiError::not_found("Tenant not found"),
        // Cross-tenant access is forbidden, full stop.
        TenantsServiceError::NotOwned => ApiError::forbidden(),
        TenantsServiceError::AlreadyExists | TenantsServiceError::InvalidReference => {
            ApiError::bad_request("invalid_tenant", "Tenant state conflict")
        }
        TenantsServiceError::Sql(source) => ApiError::log_internal("tenant storage failure", source),
    }
}

pub(crate) fn configs_error(error: &ConfigsServiceError) -> ApiError {
    match error {
        ConfigsServiceError::NotFound => ApiError::not_found("Active config not found"),
        ConfigsServiceError::InvalidKey(key) => {
            ApiError::bad_request("invalid_config_key", "Malformed config key")
                .with("key", key.clone())
        }
        ConfigsServiceError::RevisionConflict => ApiError::new(
            salvo::http::StatusCode::CONFLICT,
            "config_revision_conflict",
            "Concurrent config update, retry",
        ),
        ConfigsServiceError::InvalidReference => {
            ApiError::bad_request("invalid_tenant", "Unknown tenant")
        }
        ConfigsServiceError::Sql(source) => ApiError::log_internal("config storage failure", source),
    }
}

pub(crate) fn prompts_error(error: &PromptsServiceError) -> ApiError {
    match error {
        PromptsServiceError::NotFound => ApiError::not_found("Prompt not found"),
        PromptsServiceError::RevisionConflict => ApiError::new(
            salvo::http::StatusCode::CONFLICT,
            "prompt_revision_conflict",
            "Concurrent prompt update, retry",
        ),
        PromptsServiceError::InvalidReference => {
            ApiError::bad_request("invalid_tenant", "Unknown tenant")
        }
        PromptsServiceError::Sql(source) => ApiError::log_internal("prompt storage failure", source),
    }
}

pub(crate) fn skills_error(error: &SkillsServiceError) -> ApiError {
    match error {
        SkillsServiceError::NotFound => ApiError::not_found("Skill not found"),
        SkillsServiceError::RevisionConflict => ApiError::new(
            salvo::http::StatusCode::CONFLICT,
            "skill_revision_conflict",
            "Concurrent skill update, retry",
        ),
        SkillsServiceError::InvalidReference => {
            ApiError::bad_request("invalid_tenant", "Unknown tenant")
        }
        SkillsServiceError::Sql(source) => ApiError::log_internal("skill storage failure", source),
    }
}

pub(crate) fn events_error(error: &EventsServiceError) -> ApiError {
    match error {
        EventsServiceError::UnknownTenant => ApiError::not_found("Tenant not found"),
        EventsServiceError::Sql(source) => ApiError::log_internal("event storage failure", source),
    }
}
