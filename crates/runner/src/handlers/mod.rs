//! Internal surface handlers.

pub(crate) mod apply_config;
pub(crate) mod delete;
pub(crate) mod health;
pub(crate) mod pair_start;
pub(crate) mod provision;
pub(crate) mod restart;
pub(crate) mod start;
pub(crate) mod stop;
pub(crate) mod whatsapp_disconnect;

use std::sync::Arc;

use salvo::{Depot, prelude::Json};
use serde::{Deserialize, Serialize};
use tracing::warn;
use trellis_app::{
    bus::EventSink,
    domain::{events::types::EventKind, tenants::records::TenantId},
};

use crate::{driver::DriverError, errors::WorkerApiError, state::WorkerState};

/// Response body for accepted lifecycle operations.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GenericResponse {
    pub tenant_id: String,
    pub detail: String,
}

impl GenericResponse {
    pub(crate) fn json(tenant: &TenantId, detail: &str) -> Json<Self> {
        Json(Self {
            tenant_id: tenant.to_string(),
            detail: detail.to_string(),
        })
    }
}

/// Optional image override carried by start/restart/pair-start bodies.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ImageOverride {
    pub nexus_image: Option<String>,
}

pub(crate) fn worker_state(depot: &Depot) -> Result<Arc<WorkerState>, WorkerApiError> {
    depot
        .obtain::<Arc<WorkerState>>()
        .cloned()
        .map_err(|_| WorkerApiError::internal())
}

/// Publish an event, logging rather than failing the operation when the bus
/// is briefly unavailable.
pub(crate) async fn publish(sink: &Arc<dyn EventSink>, tenant: &TenantId, kind: EventKind) {
    if let Err(error) = sink.publish(tenant, kind).await {
        warn!(tenant_id = %tenant, "failed to publish event: {error}");
    }
}

/// Record a driver failure on the bus and convert it for the response.
pub(crate) async fn fail_driver(
    sink: &Arc<dyn EventSink>,
    tenant: &TenantId,
    error: &DriverError,
) -> WorkerApiError {
    publish(
        sink,
        tenant,
        EventKind::RuntimeError {
            error: Some(error.kind.code().to_string()),
            message: error.message.clone(),
        },
    )
    .await;

    error.into()
}
