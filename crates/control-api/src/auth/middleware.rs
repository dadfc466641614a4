//! Auth middleware.

use std::sync::Arc;

use salvo::{http::header::AUTHORIZATION, prelude::*};
use tracing::error;
use trellis_app::auth::AuthServiceError;

use crate::{extensions::*, state::State};
use trellis_app::auth::AuthService as _;

#[salvo::handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    let Some(token) = extract_bearer_token(req) else {
        res.render(StatusError::unauthorized().brief("Missing or invalid Authorization header"));

        return;
    };

    let Ok(state) = depot.obtain::<Arc<State>>() else {
        res.render(StatusError::internal_server_error());

        return;
    };

    let Ok(claims) = state.sessions.verify_access(token) else {
        res.render(StatusError::unauthorized().brief("Invalid or expired access token"));

        return;
    };

    let user = match state.app.auth.user_by_id(claims.sub).await {
        Ok(user) => user,
        Err(AuthServiceError::NotFound) => {
            res.render(StatusError::unauthorized().brief("Unknown user"));

            return;
        }
        Err(source) => {
            error!("failed to resolve token user: {source}");

            res.render(StatusError::internal_server_error());

            return;
        }
    };

    depot.insert_current_user(CurrentUser {
        id: user.id,
        email: user.email,
    });

    ctrl.call_next(req, depot, res).await;
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
