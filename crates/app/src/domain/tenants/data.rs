//! Tenant setup input.

use crate::domain::{configs::records::EnvMap, tenants::records::TenantId};

/// Everything written in the single tenant-setup transaction: the tenant row,
/// the first config revision and the initial prompt/skill artifacts.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub id: TenantId,
    pub owner_user_id: i64,
    pub initial_env: EnvMap,
    pub prompts: Vec<NewArtifact>,
    pub skills: Vec<NewArtifact>,
}

/// Named artifact content for the first revision.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub name: String,
    pub content: String,
}
