//! Worker state.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use trellis_app::{bus::EventSink, domain::tenants::records::TenantId};

use crate::{
    driver::RuntimeDriver, locks::TenantLocks, monitor::BridgeMonitors, reconcile::Reconciler,
};

/// Per-tenant pairing baselines, worker memory only.
///
/// Recorded at the moment a pair-start is accepted; any `whatsapp.qr` with
/// an id at or below the baseline predates the fresh session and is stale.
#[derive(Debug, Default)]
pub(crate) struct PairBaselines {
    baselines: Mutex<HashMap<TenantId, i64>>,
}

impl PairBaselines {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn record(&self, tenant: &TenantId, event_id: i64) {
        let mut baselines = self.baselines.lock().await;

        baselines.insert(tenant.clone(), event_id);
    }

    pub(crate) async fn get(&self, tenant: &TenantId) -> Option<i64> {
        let baselines = self.baselines.lock().await;

        baselines.get(tenant).copied()
    }
}

#[derive(Clone)]
pub(crate) struct WorkerState {
    pub(crate) driver: Arc<dyn RuntimeDriver>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) monitors: Arc<dyn BridgeMonitors>,
    pub(crate) locks: TenantLocks,
    pub(crate) baselines: Arc<PairBaselines>,
    pub(crate) reconciler: Arc<Reconciler>,
}
