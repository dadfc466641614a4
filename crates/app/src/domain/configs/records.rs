//! Config revision records.

use std::collections::BTreeMap;

use jiff::Timestamp;

use crate::domain::tenants::records::TenantId;

/// Environment map for a tenant runtime. Sorted so rendered env files and
/// JSON payloads are deterministic.
pub type EnvMap = BTreeMap<String, String>;

/// Config Revision Record
#[derive(Debug, Clone)]
pub struct ConfigRevisionRecord {
    pub tenant_id: TenantId,

    /// Monotonically increasing per-tenant revision number.
    pub revision: i64,

    pub env: EnvMap,

    /// Exactly one revision per tenant is active.
    pub is_active: bool,

    pub created_at: Timestamp,
}
