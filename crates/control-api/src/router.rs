//! App Router

use salvo::Router;

use crate::{auth, events, tenants::handlers};

/// The `/v1` surface. Auth routes and the WebSocket (which authenticates
/// from its query string) sit outside the bearer middleware; everything
/// tenant-scoped sits behind it.
pub fn app_router() -> Router {
    Router::with_path("v1")
        .push(
            Router::with_path("auth")
                .push(Router::with_path("signup").post(auth::handlers::signup::handler))
                .push(Router::with_path("login").post(auth::handlers::login::handler))
                .push(Router::with_path("refresh").post(auth::handlers::refresh::handler)),
        )
        .push(Router::with_path("events/ws").get(events::ws::handler))
        .push(
            Router::with_path("tenants")
                .hoop(auth::middleware::handler)
                .push(Router::with_path("setup").post(handlers::setup::handler))
                .push(
                    Router::with_path("{tenant_id}")
                        .delete(handlers::delete::handler)
                        .push(Router::with_path("status").get(handlers::status::handler))
                        .push(
                            Router::with_path("runtime")
                                .push(Router::with_path("start").post(handlers::start::handler))
                                .push(Router::with_path("stop").post(handlers::stop::handler))
                                .push(
                                    Router::with_path("restart")
                                        .post(handlers::restart::handler),
                                ),
                        )
                        .push(
                            Router::with_path("whatsapp")
                                .push(
                                    Router::with_path("pair/start")
                                        .post(handlers::pair_start::handler),
                                )
                                .push(
                                    Router::with_path("disconnect")
                                        .post(handlers::whatsapp_disconnect::handler),
                                ),
                        )
                        .push(
                            Router::with_path("config")
                                .get(handlers::config_get::handler)
                                .patch(handlers::config_patch::handler),
                        )
                        .push(
                            Router::with_path("prompts")
                                .get(handlers::prompts_index::handler)
                                .push(
                                    Router::with_path("{name}")
                                        .put(handlers::prompt_put::handler),
                                ),
                        )
                        .push(
                            Router::with_path("skills")
                                .get(handlers::skills_index::handler)
                                .push(
                                    Router::with_path("{skill_id}")
                                        .put(handlers::skill_put::handler),
                                ),
                        )
                        .push(
                            Router::with_path("events/recent")
                                .get(handlers::events_recent::handler),
                        )
                        .push(
                            Router::with_path("assistant/bootstrap")
                                .post(handlers::bootstrap::handler),
                        ),
                ),
        )
}

#[cfg(test)]
mod tests {
    use salvo::{prelude::*, test::TestClient};

    use crate::test_helpers::StateBuilder;

    use super::app_router;

    fn router_service() -> Service {
        let state = StateBuilder::new().build();

        Service::new(
            Router::new()
                .hoop(salvo::affix_state::inject(state))
                .push(app_router()),
        )
    }

    async fn assert_registered(method: &str, path: &str) {
        let service = router_service();
        let url = format!("http://example.com{path}");

        let res = match method {
            "GET" => TestClient::get(url).send(&service).await,
            "POST" => TestClient::post(url).send(&service).await,
            "PUT" => TestClient::put(url).send(&service).await,
            "PATCH" => TestClient::patch(url).send(&service).await,
            "DELETE" => TestClient::delete(url).send(&service).await,
            _ => unreachable!("unsupported method in test"),
        };

        assert_ne!(
            res.status_code,
            Some(StatusCode::NOT_FOUND),
            "{method} {path} should be registered"
        );
    }

    #[tokio::test]
    async fn test_auth_routes_are_registered() {
        assert_registered("POST", "/v1/auth/signup").await;
        assert_registered("POST", "/v1/auth/login").await;
        assert_registered("POST", "/v1/auth/refresh").await;
    }

    #[tokio::test]
    async fn test_tenant_routes_are_registered() {
        assert_registered("POST", "/v1/tenants/setup").await;
        assert_registered("GET", "/v1/tenants/0011223344556677/status").await;
        assert_registered("POST", "/v1/tenants/0011223344556677/runtime/start").await;
        assert_registered("POST", "/v1/tenants/0011223344556677/runtime/stop").await;
        assert_registered("POST", "/v1/tenants/0011223344556677/runtime/restart").await;
        assert_registered("POST", "/v1/tenants/0011223344556677/whatsapp/pair/start").await;
        assert_registered("POST", "/v1/tenants/0011223344556677/whatsapp/disconnect").await;
        assert_registered("DELETE", "/v1/tenants/0011223344556677").await;
    }

    #[tokio::test]
    async fn test_config_and_artifact_routes_are_registered() {
        assert_registered("GET", "/v1/tenants/0011223344556677/config").await;
        assert_registered("PATCH", "/v1/tenants/0011223344556677/config").await;
        assert_registered("GET", "/v1/tenants/0011223344556677/prompts").await;
        assert_registered("PUT", "/v1/tenants/0011223344556677/prompts/system-prompt").await;
        assert_registered("GET", "/v1/tenants/0011223344556677/skills").await;
        assert_registered("PUT", "/v1/tenants/0011223344556677/skills/reminders").await;
        assert_registered("POST", "/v1/tenants/0011223344556677/assistant/bootstrap").await;
    }

    #[tokio::test]
    async fn test_event_routes_are_registered() {
        assert_registered("GET", "/v1/tenants/0011223344556677/events/recent").await;
        assert_registered("GET", "/v1/events/ws").await;
    }

    #[tokio::test]
    async fn test_tenant_routes_require_auth() {
        let service = router_service();

        let res = TestClient::get("http://example.com/v1/tenants/0011223344556677/status")
            .send(&service)
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));
    }
}
