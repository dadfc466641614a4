//! Skills Index Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use trellis_app::domain::skills::records::SkillRevisionRecord;

use crate::{
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{errors::skills_error, owned_tenant, parse_tenant_id},
};
use trellis_app::domain::skills::SkillsService as _;

/// Skill Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SkillResponse {
    pub skill_id: String,
    pub revision: i64,
    pub content: String,
}

impl From<SkillRevisionRecord> for SkillResponse {
    fn from(record: SkillRevisionRecord) -> Self {
        Self {
            skill_id: record.skill_id.to_string(),
            revision: record.revision,
            content: record.content,
        }
    }
}

/// Skills Index Handler
#[endpoint(
    tags("skills"),
    summary = "List Skills",
    security(("bearer_auth" = []))
)]
pub(crate) async fn handler(
    tenant_id: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<Vec<SkillResponse>>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let tenant_id = parse_tenant_id(&tenant_id.into_inner())?;

    owned_tenant(&state, &tenant_id, user.id).await?;

    let skills = state
        .app
        .skills
        .list_active(&tenant_id)
        .await
        .map_err(|error| skills_error(&error))?;

    Ok(Json(skills.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;
    use trellis_app::domain::{
        prompts::records::ArtifactName,
        skills::MockSkillsService,
        tenants::MockTenantsService,
    };

    use crate::test_helpers::{StateBuilder, TEST_TENANT_ID, make_tenant, tenants_service};

    use super::*;

    #[tokio::test]
    async fn test_index_returns_active_skills() -> TestResult {
        let mut tenants = MockTenantsService::new();

        tenants
            .expect_tenant_for_owner()
            .once()
            .return_once(|id, owner| Ok(make_tenant(id, owner)));

        let mut skills = MockSkillsService::new();

        skills.expect_list_active().once().return_once(|id| {
            Ok(vec![SkillRevisionRecord {
                tenant_id: id.clone(),
                skill_id: ArtifactName::parse("reminders").expect("valid name"),
                revision: 1,
                content: "# Reminders".to_string(),
                is_active: true,
                created_at: Timestamp::UNIX_EPOCH,
            }])
        });

        let service = tenants_service(
            StateBuilder::new().tenants(tenants).skills(skills),
            Router::with_path("tenants/{tenant_id}/skills").get(handler),
        );

        let mut res = TestClient::get(format!(
            "http://example.com/tenants/{TEST_TENANT_ID}/skills"
        ))
        .send(&service)
        .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: Vec<SkillResponse> = res.take_json().await?;

        assert_eq!(body.len(), 1);
        assert_eq!(body[0].skill_id, "reminders");

        Ok(())
    }
}
