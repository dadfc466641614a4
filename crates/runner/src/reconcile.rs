//! Startup and periodic reconciliation.
//!
//! Drives engine-reported state toward the stored desired state: enumerate
//! every tenant the node knows about (directories plus running containers),
//! re-attach bridge monitors, and emit one `runtime.status` per observed
//! transition. State is always derived from the engine, never from memory;
//! the observed-state map only suppresses duplicate events.

use std::{collections::HashMap, sync::Arc, time::Duration};

use jiff::Timestamp;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use trellis_app::{
    bus::EventSink,
    domain::{
        events::types::EventKind,
        tenants::records::{TenantId, TenantState},
    },
};

use crate::{driver::RuntimeDriver, monitor::BridgeMonitors};

pub(crate) const RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

pub(crate) struct Reconciler {
    driver: Arc<dyn RuntimeDriver>,
    sink: Arc<dyn EventSink>,
    monitors: Arc<dyn BridgeMonitors>,
    last_reconcile_at: RwLock<Option<Timestamp>>,
    observed: RwLock<HashMap<TenantId, TenantState>>,
}

impl Reconciler {
    #[must_use]
    pub(crate) fn new(
        driver: Arc<dyn RuntimeDriver>,
        sink: Arc<dyn EventSink>,
        monitors: Arc<dyn BridgeMonitors>,
    ) -> Self {
        Self {
            driver,
            sink,
            monitors,
            last_reconcile_at: RwLock::new(None),
            observed: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) async fn last_reconcile_at(&self) -> Option<Timestamp> {
        *self.last_reconcile_at.read().await
    }

    /// Run forever: one pass immediately, then every interval.
    pub(crate) async fn run(&self) {
        loop {
            self.reconcile_once().await;

            tokio::time::sleep(RECONCILE_INTERVAL).await;
        }
    }

    pub(crate) async fn reconcile_once(&self) {
        let mut tenants = match self.driver.known_tenants().await {
            Ok(tenants) => tenants,
            Err(error) => {
                warn!("reconcile could not list tenant directories: {error}");
                Vec::new()
            }
        };

        // Orphan containers (engine has it, no directory) are still
        // surfaced; their state is reported and they get cleaned up when the
        // delete propagates.
        match self.driver.list_running().await {
            Ok(running) => {
                for tenant in running {
                    if !tenants.contains(&tenant) {
                        warn!(tenant_id = %tenant, "orphan runtime container observed");
                        tenants.push(tenant);
                    }
                }
            }
            Err(error) => warn!("reconcile could not list running containers: {error}"),
        }

        for tenant in tenants {
            self.reconcile_tenant(&tenant).await;
        }

        *self.last_reconcile_at.write().await = Some(Timestamp::now());
    }

    async fn reconcile_tenant(&self, tenant: &TenantId) {
        let health = match self.driver.health(tenant).await {
            Ok(health) => health,
            Err(error) => {
                warn!(tenant_id = %tenant, "reconcile health probe failed: {error}");
                return;
            }
        };

        let state = if health.container_running {
            self.monitors.start(tenant).await;

            TenantState::Running
        } else {
            TenantState::Paused
        };

        let changed = {
            let mut observed = self.observed.write().await;

            observed.insert(tenant.clone(), state) != Some(state)
        };

        if !changed {
            return;
        }

        debug!(tenant_id = %tenant, state = %state, "reconcile observed transition");

        if let Err(error) = self
            .sink
            .publish(
                tenant,
                EventKind::RuntimeStatus {
                    state,
                    status: Some(health.status_text),
                },
            )
            .await
        {
            warn!(tenant_id = %tenant, "reconcile could not publish status: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use trellis_app::bus::MockEventSink;

    use crate::{
        driver::{MockRuntimeDriver, TenantHealth},
        monitor::MockBridgeMonitors,
    };

    use super::*;

    fn tenant() -> TenantId {
        TenantId::parse("aabbccdd00112233").expect("valid tenant id")
    }

    fn health(running: bool) -> TenantHealth {
        TenantHealth {
            exists: true,
            container_running: running,
            status_text: if running {
                "Up 2 minutes".to_string()
            } else {
                "not running".to_string()
            },
            engine_available: true,
            engine_status: "27.0".to_string(),
        }
    }

    fn driver_with(running: bool) -> MockRuntimeDriver {
        let mut driver = MockRuntimeDriver::new();

        driver
            .expect_known_tenants()
            .returning(|| Ok(vec![TenantId::parse("aabbccdd00112233").expect("valid")]));

        driver.expect_list_running().returning(move || {
            if running {
                Ok(vec![TenantId::parse("aabbccdd00112233").expect("valid")])
            } else {
                Ok(vec![])
            }
        });

        driver
            .expect_health()
            .returning(move |_| Ok(health(running)));

        driver
            .expect_bridge_ws_url()
            .returning(|id| format!("ws://tenant_{id}_runtime:8765"));

        driver
    }

    #[tokio::test]
    async fn running_tenant_emits_status_exactly_once() {
        let driver = Arc::new(driver_with(true));

        let mut sink = MockEventSink::new();

        sink.expect_publish()
            .once()
            .withf(|id, kind| {
                *id == tenant()
                    && matches!(
                        kind,
                        EventKind::RuntimeStatus {
                            state: TenantState::Running,
                            ..
                        }
                    )
            })
            .returning(|_, _| Ok(1));

        let mut monitors = MockBridgeMonitors::new();

        // Re-attached on every pass; attaching to a live monitor is a no-op.
        monitors.expect_start().times(2).returning(|_| ());

        let reconciler = Reconciler::new(driver, Arc::new(sink), Arc::new(monitors));

        // Two passes; the second observes no transition and must not emit.
        reconciler.reconcile_once().await;
        reconciler.reconcile_once().await;

        assert!(reconciler.last_reconcile_at().await.is_some());
    }

    #[tokio::test]
    async fn stopped_tenant_reports_paused() {
        let driver = Arc::new(driver_with(false));

        let mut sink = MockEventSink::new();

        sink.expect_publish()
            .once()
            .withf(|_, kind| {
                matches!(
                    kind,
                    EventKind::RuntimeStatus {
                        state: TenantState::Paused,
                        ..
                    }
                )
            })
            .returning(|_, _| Ok(1));

        let reconciler = Reconciler::new(driver, Arc::new(sink), Arc::new(MockBridgeMonitors::new()));

        reconciler.reconcile_once().await;
    }

    #[tokio::test]
    async fn transition_after_stop_emits_again() {
        let mut driver = MockRuntimeDriver::new();

        driver
            .expect_known_tenants()
            .returning(|| Ok(vec![TenantId::parse("aabbccdd00112233").expect("valid")]));
        driver.expect_list_running().returning(|| Ok(vec![]));
        driver
            .expect_bridge_ws_url()
            .returning(|id| format!("ws://tenant_{id}_runtime:8765"));

        let mut call = 0;

        driver.expect_health().returning(move |_| {
            call += 1;
            // First pass running, second pass stopped.
            Ok(health(call == 1))
        });

        let mut sink = MockEventSink::new();

        sink.expect_publish().times(2).returning(|_, _| Ok(1));

        let mut monitors = MockBridgeMonitors::new();

        monitors.expect_start().once().returning(|_| ());

        let reconciler = Reconciler::new(Arc::new(driver), Arc::new(sink), Arc::new(monitors));

        reconciler.reconcile_once().await;
        reconciler.reconcile_once().await;
    }
}
