//! Test helpers.

use std::sync::Arc;

use salvo::{Router, Service, affix_state::inject};
use trellis_app::{
    bus::{EventSink, MockEventSink},
    domain::tenants::records::TenantId,
    signer::{Action, SigningKey, mint_action_token},
};

use crate::{
    auth::ActionGuard,
    driver::{MockRuntimeDriver, RuntimeDriver},
    locks::TenantLocks,
    monitor::MockBridgeMonitors,
    reconcile::Reconciler,
    state::{PairBaselines, WorkerState},
};

pub(crate) const TEST_ACTION_KEY: &str = "test-action-signing-key-0123456789abcdef";

pub(crate) fn test_tenant() -> TenantId {
    TenantId::parse("aabbccdd00112233").expect("valid tenant id")
}

fn action_key() -> SigningKey {
    SigningKey::new(TEST_ACTION_KEY.to_string(), None).expect("test key is long enough")
}

/// Mint a token the guard under test will accept.
pub(crate) fn token_for(action: Action) -> String {
    mint_action_token(&action_key(), &test_tenant(), action, 60)
}

/// Builds an injectable [`WorkerState`] around mocks. The monitor set is
/// permissive (attach/detach are fire-and-forget); everything else panics on
/// unexpected use.
pub(crate) struct WorkerStateBuilder {
    driver: MockRuntimeDriver,
    sink: MockEventSink,
}

impl WorkerStateBuilder {
    pub(crate) fn new() -> Self {
        Self {
            driver: MockRuntimeDriver::new(),
            sink: MockEventSink::new(),
        }
    }

    pub(crate) fn driver(mut self, driver: MockRuntimeDriver) -> Self {
        self.driver = driver;
        self
    }

    pub(crate) fn sink(mut self, sink: MockEventSink) -> Self {
        self.sink = sink;
        self
    }

    pub(crate) fn build(self) -> Arc<WorkerState> {
        let driver: Arc<dyn RuntimeDriver> = Arc::new(self.driver);
        let sink: Arc<dyn EventSink> = Arc::new(self.sink);

        let mut monitors = MockBridgeMonitors::new();

        monitors.expect_start().returning(|_| ());
        monitors.expect_stop().returning(|_| ());
        monitors.expect_active_count().returning(|| 0);
        monitors.expect_shutdown().returning(|| ());

        let monitors = Arc::new(monitors);

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&driver),
            Arc::clone(&sink),
            monitors.clone(),
        ));

        Arc::new(WorkerState {
            driver,
            sink,
            monitors,
            locks: TenantLocks::new(),
            baselines: Arc::new(PairBaselines::new()),
            reconciler,
        })
    }
}

/// Service with the action guard wired exactly as in `main`.
pub(crate) fn internal_service(
    builder: WorkerStateBuilder,
    action: Action,
    route: Router,
) -> Service {
    internal_service_with_state(builder, action, route).0
}

pub(crate) fn internal_service_with_state(
    builder: WorkerStateBuilder,
    action: Action,
    route: Router,
) -> (Service, Arc<WorkerState>) {
    let state = builder.build();

    let service = Service::new(
        Router::new()
            .hoop(inject(Arc::clone(&state)))
            .push(route.hoop(ActionGuard::new(action, action_key()))),
    );

    (service, state)
}
