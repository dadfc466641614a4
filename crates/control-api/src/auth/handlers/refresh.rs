//! Refresh Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{handlers::TokensResponse, into_api_error},
    errors::ApiError,
    extensions::*,
    state::State,
};
use trellis_app::auth::AuthService as _;

/// Refresh Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh Handler
///
/// Rotate-on-use: the presented refresh token's nonce is retired, so a
/// replayed refresh token fails even inside its validity window.
#[endpoint(
    tags("auth"),
    summary = "Refresh Tokens",
    responses(
        (status_code = StatusCode::OK, description = "Fresh token pair"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Invalid refresh token"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<RefreshRequest>,
    depot: &mut Depot,
) -> Result<Json<TokensResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let body = json.into_inner();

    let claims = state
        .sessions
        .verify_refresh(&body.refresh_token)
        .map_err(|_| ApiError::unauthorized())?;

    if !state.refresh_ledger.spend(&claims) {
        return Err(ApiError::unauthorized());
    }

    let user = state
        .app
        .auth
        .user_by_id(claims.sub)
        .await
        .map_err(|error| into_api_error(&error))?;

    let tokens = state.sessions.issue(user.id, &user.email);

    Ok(Json(tokens.into()))
}
