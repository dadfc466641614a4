//! Skill revision records.

use jiff::Timestamp;

use crate::domain::{prompts::records::ArtifactName, tenants::records::TenantId};

/// Skill Revision Record
#[derive(Debug, Clone)]
pub struct SkillRevisionRecord {
    pub tenant_id: TenantId,
    pub skill_id: ArtifactName,
    pub revision: i64,
    pub content: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}
