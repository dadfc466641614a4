//! Test helpers.

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{affix_state::inject, prelude::*};
use tokio::sync::broadcast;
use trellis_app::{
    auth::{MockAuthService, RefreshLedger, SessionSigner, UserRecord},
    bus::{MockEventSink, MockEventStream},
    context::AppContext,
    domain::{
        configs::{MockConfigsService, records::ConfigRevisionRecord},
        events::MockEventsService,
        prompts::MockPromptsService,
        skills::MockSkillsService,
        tenants::{
            MockTenantsService,
            records::{TenantId, TenantRecord, TenantState},
        },
    },
    signer::SigningKey,
};

use crate::{auth::rate_limit::RateLimiter, extensions::*, state::State, worker::MockWorkerClient};

pub(crate) const TEST_TENANT_ID: &str = "0011223344556677";

pub(crate) const TEST_IMAGE: &str = "ghcr.io/trellis/nexus-runtime:sha-abc123";

const TEST_SESSION_KEY: &str = "test-session-signing-key-0123456789abcdef";

/// A signer matching the one `StateBuilder` installs, so tests can mint
/// valid tokens.
pub(crate) fn test_sessions() -> SessionSigner {
    let key = SigningKey::new(TEST_SESSION_KEY.to_string(), None).expect("test key is long enough");

    SessionSigner::new(key, 3600, 86400)
}

pub(crate) fn make_user(id: i64, email: &str) -> UserRecord {
    UserRecord {
        id,
        email: email.to_string(),
        password_hash: "$argon2id$test".to_string(),
        created_at: Timestamp::UNIX_EPOCH,
    }
}

pub(crate) fn make_tenant(id: &TenantId, owner_user_id: i64) -> TenantRecord {
    TenantRecord {
        id: id.clone(),
        owner_user_id,
        desired_state: TenantState::Stopped,
        actual_state: TenantState::Provisioning,
        last_heartbeat: None,
        last_error: None,
        assistant_defaults_version: None,
        created_at: Timestamp::UNIX_EPOCH,
        updated_at: Timestamp::UNIX_EPOCH,
    }
}

pub(crate) fn config_with_key(tenant: &TenantId) -> ConfigRevisionRecord {
    ConfigRevisionRecord {
        tenant_id: tenant.clone(),
        revision: 1,
        env: [
            ("NEXUS_CONFIG_DIR".to_string(), "/data/config".to_string()),
            (
                "NEXUS_OPENROUTER_API_KEY".to_string(),
                "sk-test".to_string(),
            ),
        ]
        .into_iter()
        .collect(),
        is_active: true,
        created_at: Timestamp::UNIX_EPOCH,
    }
}

pub(crate) fn config_without_key(tenant: &TenantId) -> ConfigRevisionRecord {
    let mut record = config_with_key(tenant);

    record.env.remove("NEXUS_OPENROUTER_API_KEY");

    record
}

/// Builds an injectable [`State`] around mocks. Services without explicit
/// mocks panic on use, which keeps handler tests honest about what they
/// touch.
pub(crate) struct StateBuilder {
    auth: MockAuthService,
    tenants: MockTenantsService,
    configs: MockConfigsService,
    prompts: MockPromptsService,
    skills: MockSkillsService,
    events: MockEventsService,
    sink: MockEventSink,
    worker: MockWorkerClient,
    nexus_image: Option<String>,
}

impl StateBuilder {
    pub(crate) fn new() -> Self {
        Self {
            auth: MockAuthService::new(),
            tenants: MockTenantsService::new(),
            configs: MockConfigsService::new(),
            prompts: MockPromptsService::new(),
            skills: MockSkillsService::new(),
            events: MockEventsService::new(),
            sink: MockEventSink::new(),
            worker: MockWorkerClient::new(),
            nexus_image: Some(TEST_IMAGE.to_string()),
        }
    }

    pub(crate) fn auth(mut self, auth: MockAuthService) -> Self {
        self.auth = auth;
        self
    }

    pub(crate) fn tenants(mut self, tenants: MockTenantsService) -> Self {
        self.tenants = tenants;
        self
    }

    pub(crate) fn configs(mut self, configs: MockConfigsService) -> Self {
        self.configs = configs;
        self
    }

    pub(crate) fn prompts(mut self, prompts: MockPromptsService) -> Self {
        self.prompts = prompts;
        self
    }

    pub(crate) fn skills(mut self, skills: MockSkillsService) -> Self {
        self.skills = skills;
        self
    }

    pub(crate) fn events(mut self, events: MockEventsService) -> Self {
        self.events = events;
        self
    }

    pub(crate) fn sink(mut self, sink: MockEventSink) -> Self {
        self.sink = sink;
        self
    }

    pub(crate) fn worker(mut self, worker: MockWorkerClient) -> Self {
        self.worker = worker;
        self
    }

    pub(crate) fn nexus_image(mut self, image: &str) -> Self {
        self.nexus_image = Some(image.to_string());
        self
    }

    pub(crate) fn build(self) -> Arc<State> {
        let mut stream = MockEventStream::new();

        stream
            .expect_subscribe()
            .returning(|_| broadcast::channel(8).1);

        Arc::new(State {
            app: AppContext {
                auth: Arc::new(self.auth),
                tenants: Arc::new(self.tenants),
                configs: Arc::new(self.configs),
                prompts: Arc::new(self.prompts),
                skills: Arc::new(self.skills),
                events: Arc::new(self.events),
                sink: Arc::new(self.sink),
            },
            stream: Arc::new(stream),
            worker: Arc::new(self.worker),
            sessions: test_sessions(),
            refresh_ledger: Arc::new(RefreshLedger::new()),
            signup_limiter: Arc::new(RateLimiter::new(1000)),
            nexus_image: self.nexus_image,
        })
    }
}

/// Inject a fixed authenticated user, bypassing the bearer middleware.
#[salvo::handler]
pub(crate) async fn inject_user(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    depot.insert_current_user(CurrentUser {
        id: 1,
        email: "test@example.com".to_string(),
    });

    ctrl.call_next(req, depot, res).await;
}

/// Service for auth handlers: state only, no user injection.
pub(crate) fn auth_service(builder: StateBuilder, route: Router) -> Service {
    Service::new(
        Router::new()
            .hoop(inject(builder.build()))
            .push(route),
    )
}

/// Service for tenant handlers: state plus a fixed authenticated user.
pub(crate) fn tenants_service(builder: StateBuilder, route: Router) -> Service {
    Service::new(
        Router::new()
            .hoop(inject(builder.build()))
            .hoop(inject_user)
            .push(route),
    )
}
