//! Login Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{handlers::AuthResponse, into_api_error},
    errors::ApiError,
    extensions::*,
    state::State,
};
use trellis_app::auth::AuthService as _;

/// Login Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login Handler
#[endpoint(
    tags("auth"),
    summary = "Log In",
    responses(
        (status_code = StatusCode::OK, description = "Authenticated"),
        (status_code = StatusCode::UNAUTHORIZED, description = "Invalid credentials"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<LoginRequest>,
    depot: &mut Depot,
) -> Result<Json<AuthResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let body = json.into_inner();

    let email = body.email.trim().to_lowercase();

    let user = state
        .app
        .auth
        .login(&email, &body.password)
        .await
        .map_err(|error| into_api_error(&error))?;

    let tokens = state.sessions.issue(user.id, &user.email);

    Ok(Json(AuthResponse {
        user: user.into(),
        tokens: tokens.into(),
    }))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use testresult::TestResult;
    use trellis_app::auth::{AuthServiceError, MockAuthService};

    use crate::test_helpers::{StateBuilder, auth_service, make_user};

    use super::*;

    fn make_service(auth: MockAuthService) -> Service {
        auth_service(
            StateBuilder::new().auth(auth),
            Router::with_path("auth/login").post(handler),
        )
    }

    #[tokio::test]
    async fn test_login_yields_tokens() -> TestResult {
        let mut auth = MockAuthService::new();

        auth.expect_login()
            .once()
            .withf(|email, password| email == "alice@example.com" && password == "p4ssword-ok")
            .return_once(|email, _| Ok(make_user(1, email)));

        let mut res = TestClient::post("http://example.com/auth/login")
            .json(&json!({ "email": "alice@example.com", "password": "p4ssword-ok" }))
            .send(&make_service(auth))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: AuthResponse = res.take_json().await?;

        assert!(!body.tokens.refresh_token.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_bad_credentials_return_401() -> TestResult {
        let mut auth = MockAuthService::new();

        auth.expect_login()
            .once()
            .return_once(|_, _| Err(AuthServiceError::InvalidCredentials));

        let res = TestClient::post("http://example.com/auth/login")
            .json(&json!({ "email": "alice@example.com", "password": "wrong-password" }))
            .send(&make_service(auth))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));

        Ok(())
    }
}
