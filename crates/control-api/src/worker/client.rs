//! Runner HTTP client.
//!
//! Every call mints a single-tenant, single-action token; the runner rejects
//! anything else. Failures carry the runner's own status and stable code so
//! handlers can pass them straight through.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trellis_app::{
    domain::{configs::records::EnvMap, tenants::records::TenantId},
    signer::{Action, SigningKey, mint_action_token},
};

/// Outer deadline on any runner call. Driver operations may take a while
/// when images are cold, so this sits well above the runner's own engine
/// deadline margin.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(150);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PromptBody {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SkillBody {
    pub skill_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ProvisionBody {
    pub tenant_id: String,
    pub nexus_image: String,
    pub runtime_env: EnvMap,
    pub bridge_shared_secret: String,
    pub prompts: Vec<PromptBody>,
    pub skills: Vec<SkillBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApplyConfigBody {
    pub env: EnvMap,
    pub prompts: Vec<PromptBody>,
    pub skills: Vec<SkillBody>,
    pub config_revision: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
struct ImageOverrideBody {
    nexus_image: Option<String>,
}

/// Per-tenant health as reported by the runner.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WorkerHealth {
    pub tenant_id: String,
    pub container_running: bool,
    pub status_text: String,
    pub engine_available: bool,
}

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub(crate) struct WorkerError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl WorkerError {
    /// Transient transport failure: the persisted intent stays in place and
    /// the next start/restart or reconcile pass recovers.
    fn transport(message: String) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
            code: "service_unavailable".to_string(),
            message,
        }
    }
}

#[automock]
#[async_trait]
pub(crate) trait WorkerClient: Send + Sync {
    async fn provision(
        &self,
        tenant: &TenantId,
        body: ProvisionBody,
    ) -> Result<(), WorkerError>;

    async fn start(&self, tenant: &TenantId, image: Option<String>) -> Result<(), WorkerError>;

    async fn stop(&self, tenant: &TenantId) -> Result<(), WorkerError>;

    async fn restart(&self, tenant: &TenantId, image: Option<String>) -> Result<(), WorkerError>;

    async fn pair_start(
        &self,
        tenant: &TenantId,
        image: Option<String>,
    ) -> Result<(), WorkerError>;

    async fn apply_config(
        &self,
        tenant: &TenantId,
        body: ApplyConfigBody,
    ) -> Result<(), WorkerError>;

    async fn whatsapp_disconnect(&self, tenant: &TenantId) -> Result<(), WorkerError>;

    async fn health(&self, tenant: &TenantId) -> Result<WorkerHealth, WorkerError>;

    async fn delete(&self, tenant: &TenantId) -> Result<(), WorkerError>;
}

/// HTTP client for the runner's `/internal` surface.
#[derive(Debug, Clone)]
pub struct HttpWorkerClient {
    base_url: String,
    key: SigningKey,
    token_ttl_seconds: i64,
    http: Client,
}

impl HttpWorkerClient {
    #[must_use]
    pub fn new(base_url: String, key: SigningKey, token_ttl_seconds: i64) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with static configuration");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
            token_ttl_seconds,
            http,
        }
    }

    async fn request<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        tenant: &TenantId,
        action: Action,
        body: Option<&B>,
    ) -> Result<reqwest::Response, WorkerError> {
        let token = mint_action_token(&self.key, tenant, action, self.token_ttl_seconds);
        let url = format!("{}{path}", self.base_url);

        let mut request = self.http.request(method, &url).bearer_auth(token);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|error| WorkerError::transport(format!("runner request failed: {error}")))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        let (code, message) = parse_error_body(&text);

        Err(WorkerError {
            status,
            code,
            message,
        })
    }
}

/// Pull the stable code out of a `{"detail": {...}}` body, falling back to
/// the raw text.
fn parse_error_body(text: &str) -> (String, String) {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        let detail = value.get("detail");

        if let Some(detail) = detail.and_then(serde_json::Value::as_object) {
            let code = detail
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("runner_error")
                .to_string();
            let message = detail
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(text)
                .to_string();

            return (code, message);
        }

        if let Some(detail) = detail.and_then(serde_json::Value::as_str) {
            return ("runner_error".to_string(), detail.to_string());
        }
    }

    ("runner_error".to_string(), text.to_string())
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn provision(
        &self,
        tenant: &TenantId,
        body: ProvisionBody,
    ) -> Result<(), WorkerError> {
        self.request(
            Method::POST,
            &format!("/internal/tenants/{tenant}/provision"),
            tenant,
            Action::Provision,
            Some(&body),
        )
        .await
        .map(|_| ())
    }

    async fn start(&self, tenant: &TenantId, image: Option<String>) -> Result<(), WorkerError> {
        self.request(
            Method::POST,
            &format!("/internal/tenants/{tenant}/start"),
            tenant,
            Action::Start,
            Some(&ImageOverrideBody { nexus_image: image }),
        )
        .await
        .map(|_| ())
    }

    async fn stop(&self, tenant: &TenantId) -> Result<(), WorkerError> {
        self.request::<()>(
            Method::POST,
            &format!("/internal/tenants/{tenant}/stop"),
            tenant,
            Action::Stop,
            None,
        )
        .await
        .map(|_| ())
    }

    async fn restart(&self, tenant: &TenantId, image: Option<String>) -> Result<(), WorkerError> {
        self.request(
            Method::POST,
            &format!("/internal/tenants/{tenant}/restart"),
            tenant,
            Action::Restart,
            Some(&ImageOverrideBody { nexus_image: image }),
        )
        .await
        .map(|_| ())
    }

    async fn pair_start(
        &self,
        tenant: &TenantId,
        image: Option<String>,
    ) -> Result<(), WorkerError> {
        self.request(
            Method::POST,
            &format!("/internal/tenants/{tenant}/pair/start"),
            tenant,
            Action::PairStart,
            Some(&ImageOverrideBody { nexus_image: image }),
        )
        .await
        .map(|_| ())
    }

    async fn apply_config(
        &self,
        tenant: &TenantId,
        body: ApplyConfigBody,
    ) -> Result<(), WorkerError> {
        self.request(
            Method::POST,
            &format!("/internal/tenants/{tenant}/apply-config"),
            tenant,
            Action::ApplyConfig,
            Some(&body),
        )
        .await
        .map(|_| ())
    }

    async fn whatsapp_disconnect(&self, tenant: &TenantId) -> Result<(), WorkerError> {
        self.request::<()>(
            Method::POST,
            &format!("/internal/tenants/{tenant}/whatsapp/disconnect"),
            tenant,
            Action::WhatsappDisconnect,
            None,
        )
        .await
        .map(|_| ())
    }

    async fn health(&self, tenant: &TenantId) -> Result<WorkerHealth, WorkerError> {
        let response = self
            .request::<()>(
                Method::GET,
                &format!("/internal/tenants/{tenant}/health"),
                tenant,
                Action::Health,
                None,
            )
            .await?;

        response
            .json()
            .await
            .map_err(|error| WorkerError::transport(format!("bad health body: {error}")))
    }

    async fn delete(&self, tenant: &TenantId) -> Result<(), WorkerError> {
        self.request::<()>(
            Method::DELETE,
            &format!("/internal/tenants/{tenant}"),
            tenant,
            Action::Delete,
            None,
        )
        .await
        .map(|_| ())
    }
}
