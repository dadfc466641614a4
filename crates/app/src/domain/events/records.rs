//! Event records and the wire envelope.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{events::types::EventKind, tenants::records::TenantId};

/// Stored event row. `event_id` ordering is the authoritative delivery order.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_id: i64,
    pub tenant_id: TenantId,
    pub event_type: String,
    pub payload: Value,
    pub created_at: Timestamp,
}

impl EventRecord {
    /// Interpret the stored type/payload pair as a typed event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::from_parts(&self.event_type, self.payload.clone())
    }

    #[must_use]
    pub fn envelope(&self) -> EventEnvelope {
        EventEnvelope {
            event_id: self.event_id,
            tenant_id: self.tenant_id.clone(),
            event_type: self.event_type.clone(),
            created_at: self.created_at,
            payload: self.payload.clone(),
        }
    }
}

/// JSON envelope delivered on the WebSocket and the poll endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: i64,
    pub tenant_id: TenantId,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created_at: Timestamp,
    pub payload: Value,
}
