//! Action token guard.
//!
//! Every `/internal` route is guarded by a token naming exactly the tenant
//! in the path and the action of that route; any mismatch is forbidden. The
//! validated tenant id is left in the depot for the handler.

use salvo::{
    Depot, FlowCtrl, Handler, Request, Response,
    http::header::AUTHORIZATION,
};
use trellis_app::{
    domain::tenants::records::TenantId,
    signer::{Action, SignerError, SigningKey, verify_action_token},
};

use crate::errors::WorkerApiError;

const TENANT_ID_KEY: &str = "tenant_id";

/// Route guard checking the bearer action token.
pub(crate) struct ActionGuard {
    action: Action,
    key: SigningKey,
}

impl ActionGuard {
    #[must_use]
    pub(crate) fn new(action: Action, key: SigningKey) -> Self {
        Self { action, key }
    }

    fn check(&self, req: &Request) -> Result<TenantId, WorkerApiError> {
        let tenant = req
            .param::<String>("tenant_id")
            .ok_or_else(|| WorkerApiError::bad_request("invalid_tenant_id", "Missing tenant id"))?;

        let tenant = TenantId::parse(&tenant)
            .map_err(|_| WorkerApiError::bad_request("invalid_tenant_id", "Malformed tenant id"))?;

        let token = extract_bearer_token(req)
            .ok_or_else(|| WorkerApiError::unauthorized("Missing bearer token"))?;

        verify_action_token(&self.key, token, &tenant, self.action).map_err(|error| match error {
            SignerError::Expired => {
                WorkerApiError::forbidden("token_expired", "Action token expired")
            }
            SignerError::ScopeMismatch => {
                WorkerApiError::forbidden("scope_mismatch", "Token tenant or action mismatch")
            }
            _ => WorkerApiError::forbidden("invalid_token", "Invalid action token"),
        })?;

        Ok(tenant)
    }
}

#[salvo::async_trait]
impl Handler for ActionGuard {
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        ctrl: &mut FlowCtrl,
    ) {
        match self.check(req) {
            Ok(tenant) => {
                depot.insert(TENANT_ID_KEY, tenant);

                ctrl.call_next(req, depot, res).await;
            }
            Err(error) => {
                use salvo::Writer as _;

                error.write(req, depot, res).await;
                ctrl.skip_rest();
            }
        }
    }
}

/// The tenant id validated by the guard.
pub(crate) fn guarded_tenant(depot: &Depot) -> Result<TenantId, WorkerApiError> {
    depot
        .get::<TenantId>(TENANT_ID_KEY)
        .ok()
        .cloned()
        .ok_or_else(|| WorkerApiError::unauthorized("Missing action token"))
}

fn extract_bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.splitn(2, ' ');

    let scheme = parts.next()?;
    let token = parts.next()?.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}
