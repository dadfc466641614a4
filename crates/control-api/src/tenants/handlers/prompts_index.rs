//! Prompts Index Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use trellis_app::domain::prompts::records::PromptRevisionRecord;

use crate::{
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{errors::prompts_error, owned_tenant, parse_tenant_id},
};
use trellis_app::domain::prompts::PromptsService as _;

/// Prompt Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct PromptResponse {
    pub name: String,
    pub revision: i64,
    pub content: String,
}

impl From<PromptRevisionRecord> for PromptResponse {
    fn from(record: PromptRevisionRecord) -> Self {
        Self {
            name: record.name.to_string(),
            revision: record.revision,
            content: record.content,
        }
    }
}

/// Prompts Index Handler
///
/// Returns the active revision of every prompt, ordered by name.
#[endpoint(
    tags("prompts"),
    summary = "List Prompts",
    security(("bearer_auth" = []))
)]
pub(crate) async fn handler(
    tenant_id: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<Vec<PromptResponse>>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let tenant_id = parse_tenant_id(&tenant_id.into_inner())?;

    owned_tenant(&state, &tenant_id, user.id).await?;

    let prompts = state
        .app
        .prompts
        .list_active(&tenant_id)
        .await
        .map_err(|error| prompts_error(&error))?;

    Ok(Json(prompts.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;
    use trellis_app::domain::{
        prompts::{MockPromptsService, records::ArtifactName},
        tenants::MockTenantsService,
    };

    use crate::test_helpers::{StateBuilder, TEST_TENANT_ID, make_tenant, tenants_service};

    use super::*;

    #[tokio::test]
    async fn test_index_returns_active_prompts() -> TestResult {
        let mut tenants = MockTenantsService::new();

        tenants
            .expect_tenant_for_owner()
            .once()
            .return_once(|id, owner| Ok(make_tenant(id, owner)));

        let mut prompts = MockPromptsService::new();

        prompts.expect_list_active().once().return_once(|id| {
            Ok(vec![PromptRevisionRecord {
                tenant_id: id.clone(),
                name: ArtifactName::parse("system-prompt").expect("valid name"),
                revision: 3,
                content: "be helpful".to_string(),
                is_active: true,
                created_at: Timestamp::UNIX_EPOCH,
            }])
        });

        let service = tenants_service(
            StateBuilder::new().tenants(tenants).prompts(prompts),
            Router::with_path("tenants/{tenant_id}/prompts").get(handler),
        );

        let mut res = TestClient::get(format!(
            "http://example.com/tenants/{TEST_TENANT_ID}/prompts"
        ))
        .send(&service)
        .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: Vec<PromptResponse> = res.take_json().await?;

        assert_eq!(body.len(), 1);
        assert_eq!(body[0].name, "system-prompt");
        assert_eq!(body[0].revision, 3);

        Ok(())
    }
}
