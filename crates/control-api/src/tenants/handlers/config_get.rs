//! Get Config Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use trellis_app::domain::configs::records::{ConfigRevisionRecord, EnvMap};

use crate::{
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{errors::configs_error, owned_tenant, parse_tenant_id},
};
use trellis_app::domain::configs::ConfigsService as _;

/// Config Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ConfigResponse {
    pub tenant_id: String,
    pub revision: i64,
    pub env_json: EnvMap,
}

impl From<ConfigRevisionRecord> for ConfigResponse {
    fn from(record: ConfigRevisionRecord) -> Self {
        Self {
            tenant_id: record.tenant_id.to_string(),
            revision: record.revision,
            env_json: record.env,
        }
    }
}

/// Get Config Handler
///
/// Returns the single active revision.
#[endpoint(
    tags("config"),
    summary = "Get Config",
    security(("bearer_auth" = []))
)]
pub(crate) async fn handler(
    tenant_id: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<ConfigResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let tenant_id = parse_tenant_id(&tenant_id.into_inner())?;

    owned_tenant(&state, &tenant_id, user.id).await?;

    let active = state
        .app
        .configs
        .active_config(&tenant_id)
        .await
        .map_err(|error| configs_error(&error))?;

    Ok(Json(active.into()))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;
    use trellis_app::domain::{
        configs::{ConfigsServiceError, MockConfigsService},
        tenants::MockTenantsService,
    };

    use crate::test_helpers::{
        StateBuilder, TEST_TENANT_ID, config_with_key, make_tenant, tenants_service,
    };

    use super::*;

    fn make_service(tenants: MockTenantsService, configs: MockConfigsService) -> Service {
        tenants_service(
            StateBuilder::new().tenants(tenants).configs(configs),
            Router::with_path("tenants/{tenant_id}/config").get(handler),
        )
    }

    #[tokio::test]
    async fn test_get_config_returns_active_revision() -> TestResult {
        let mut tenants = MockTenantsService::new();

        tenants
            .expect_tenant_for_owner()
            .once()
            .return_once(|id, owner| Ok(make_tenant(id, owner)));

        let mut configs = MockConfigsService::new();

        configs
            .expect_active_config()
            .once()
            .return_once(|id| Ok(config_with_key(id)));

        let mut res = TestClient::get(format!(
            "http://example.com/tenants/{TEST_TENANT_ID}/config"
        ))
        .send(&make_service(tenants, configs))
        .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: ConfigResponse = res.take_json().await?;

        assert_eq!(body.tenant_id, TEST_TENANT_ID);
        assert_eq!(body.revision, 1);
        assert_eq!(
            body.env_json.get("NEXUS_OPENROUTER_API_KEY").map(String::as_str),
            Some("sk-test")
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_active_config_is_404() -> TestResult {
        let mut tenants = MockTenantsService::new();

        tenants
            .expect_tenant_for_owner()
            .once()
            .return_once(|id, owner| Ok(make_tenant(id, owner)));

        let mut configs = MockConfigsService::new();

        configs
            .expect_active_config()
            .once()
            .return_once(|_| Err(ConfigsServiceError::NotFound));

        let res = TestClient::get(format!(
            "http://example.com/tenants/{TEST_TENANT_ID}/config"
        ))
        .send(&make_service(tenants, configs))
        .await;

        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));

        Ok(())
    }
}
