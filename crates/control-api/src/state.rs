//! State

use std::sync::Arc;

use trellis_app::{
    auth::{RefreshLedger, SessionSigner},
    bus::EventStream,
    context::AppContext,
};

use crate::{auth::rate_limit::RateLimiter, config::ServerConfig, worker::WorkerClient};

#[derive(Clone)]
pub(crate) struct State {
    pub(crate) app: AppContext,
    pub(crate) stream: Arc<dyn EventStream>,
    pub(crate) worker: Arc<dyn WorkerClient>,
    pub(crate) sessions: SessionSigner,
    pub(crate) refresh_ledger: Arc<RefreshLedger>,
    pub(crate) signup_limiter: Arc<RateLimiter>,

    /// Runtime image reference, `None` while unset or a placeholder.
    pub(crate) nexus_image: Option<String>,
}

impl State {
    pub(crate) fn build(
        app: AppContext,
        stream: Arc<dyn EventStream>,
        worker: Arc<dyn WorkerClient>,
        sessions: SessionSigner,
        config: &ServerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            app,
            stream,
            worker,
            sessions,
            refresh_ledger: Arc::new(RefreshLedger::new()),
            signup_limiter: Arc::new(RateLimiter::new(config.auth.ratelimit_signup_per_minute)),
            nexus_image: config.runtime.valid_image(),
        })
    }
}
