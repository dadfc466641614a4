//! Signup Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{handlers::{AuthResponse, validate_credentials}, into_api_error},
    errors::ApiError,
    extensions::*,
    state::State,
};
use trellis_app::auth::AuthService as _;

/// Signup Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SignupRequest {
    pub email: String,
    pub password: String,
}

/// Signup Handler
#[endpoint(
    tags("auth"),
    summary = "Sign Up",
    responses(
        (status_code = StatusCode::CREATED, description = "User created"),
        (status_code = StatusCode::CONFLICT, description = "Email already registered"),
        (status_code = StatusCode::TOO_MANY_REQUESTS, description = "Rate limited"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<SignupRequest>,
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<AuthResponse>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let body = json.into_inner();

    let client_key = req.remote_addr().to_string();

    if !state.signup_limiter.check(&client_key) {
        return Err(ApiError::too_many_requests());
    }

    validate_credentials(&body.email, &body.password)?;

    let email = body.email.trim().to_lowercase();

    let user = state
        .app
        .auth
        .signup(&email, &body.password)
        .await
        .map_err(|error| into_api_error(&error))?;

    let tokens = state.sessions.issue(user.id, &user.email);

    res.status_code(StatusCode::CREATED);

    Ok(Json(AuthResponse {
        user: user.into(),
        tokens: tokens.into(),
    }))
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use testresult::TestResult;
    use trellis_app::auth::{AuthServiceError, MockAuthService, UserRecord};

    use crate::test_helpers::{StateBuilder, auth_service};

    use super::*;

    fn make_service(auth: MockAuthService) -> Service {
        auth_service(
            StateBuilder::new().auth(auth),
            Router::with_path("auth/signup").post(handler),
        )
    }

    #[tokio::test]
    async fn test_signup_returns_user_and_tokens() -> TestResult {
        let mut auth = MockAuthService::new();

        auth.expect_signup()
            .once()
            .withf(|email, password| email == "alice@example.com" && password == "p4ssword-ok")
            .return_once(|email, _| {
                Ok(UserRecord {
                    id: 1,
                    email: email.to_string(),
                    password_hash: "$argon2id$test".to_string(),
                    created_at: Timestamp::UNIX_EPOCH,
                })
            });

        let mut res = TestClient::post("http://example.com/auth/signup")
            .json(&json!({ "email": "alice@example.com", "password": "p4ssword-ok" }))
            .send(&make_service(auth))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::CREATED));

        let body: AuthResponse = res.take_json().await?;

        assert_eq!(body.user.email, "alice@example.com");
        assert!(!body.tokens.access_token.is_empty());
        assert_eq!(body.tokens.token_type, "bearer");

        Ok(())
    }

    #[tokio::test]
    async fn test_email_is_lowercased() -> TestResult {
        let mut auth = MockAuthService::new();

        auth.expect_signup()
            .once()
            .withf(|email, _| email == "alice@example.com")
            .return_once(|email, _| {
                Ok(UserRecord {
                    id: 1,
                    email: email.to_string(),
                    password_hash: "$argon2id$test".to_string(),
                    created_at: Timestamp::UNIX_EPOCH,
                })
            });

        let res = TestClient::post("http://example.com/auth/signup")
            .json(&json!({ "email": "ALICE@Example.com", "password": "p4ssword-ok" }))
            .send(&make_service(auth))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::CREATED));

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_email_returns_409() -> TestResult {
        let mut auth = MockAuthService::new();

        auth.expect_signup()
            .once()
            .return_once(|_, _| Err(AuthServiceError::EmailTaken));

        let mut res = TestClient::post("http://example.com/auth/signup")
            .json(&json!({ "email": "alice@example.com", "password": "p4ssword-ok" }))
            .send(&make_service(auth))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::CONFLICT));

        let body: serde_json::Value = res.take_json().await?;

        assert_eq!(body["detail"]["error"], "email_already_registered");

        Ok(())
    }

    #[tokio::test]
    async fn test_short_password_is_rejected() -> TestResult {
        let mut auth = MockAuthService::new();

        auth.expect_signup().never();

        let res = TestClient::post("http://example.com/auth/signup")
            .json(&json!({ "email": "alice@example.com", "password": "short" }))
            .send(&make_service(auth))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }
}
