//! API error responses.
//!
//! The wire contract fixes error bodies to `{"detail": {"error", "message",
//! …}}` so clients can branch on stable codes; `StatusError` cannot carry
//! that shape, hence this writer.

use salvo::{
    Depot, Request, Response, Writer,
    http::StatusCode,
    oapi::{self, EndpointOutRegister},
    prelude::Json,
};
use serde_json::{Map, Value, json};
use tracing::error;

use crate::worker::WorkerError;

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
    extra: Map<String, Value>,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            extra: Map::new(),
        }
    }

    /// Attach an extra field to the `detail` object.
    #[must_use]
    pub(crate) fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub(crate) fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Missing or invalid credentials",
        )
    }

    pub(crate) fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", "Access denied")
    }

    pub(crate) fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub(crate) fn bad_request(code: &str, message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub(crate) fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        )
    }

    pub(crate) fn too_many_requests() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Rate limit exceeded",
        )
    }

    /// 409 naming the tenant the caller already owns.
    pub(crate) fn tenant_already_exists(tenant_id: &str) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "tenant_already_exists",
            "User already owns a tenant",
        )
        .with("tenant_id", tenant_id)
    }

    /// The model-provider key pre-condition for runtime start.
    pub(crate) fn openrouter_key_required() -> Self {
        Self::bad_request(
            "openrouter_api_key_required",
            "NEXUS_OPENROUTER_API_KEY is required before runtime start",
        )
    }

    pub(crate) fn nexus_image_invalid() -> Self {
        Self::bad_request(
            "nexus_image_invalid",
            "Control-plane NEXUS_IMAGE is not set to a valid runtime tag",
        )
    }

    /// Surface a runner failure with its own status and code.
    pub(crate) fn from_worker(error: &WorkerError) -> Self {
        let status = StatusCode::from_u16(error.status)
            .unwrap_or(StatusCode::BAD_GATEWAY);

        Self::new(status, &error.code, error.message.clone())
    }

    /// Log the underlying failure and answer with a bare 500.
    pub(crate) fn log_internal(context: &str, source: &dyn std::fmt::Display) -> Self {
        error!("{context}: {source}");

        Self::internal()
    }
}

#[salvo::async_trait]
impl Writer for ApiError {
    async fn write(mut self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        let mut detail = Map::new();

        detail.insert("error".to_string(), json!(self.code));
        detail.insert("message".to_string(), json!(self.message));
        detail.extend(self.extra);

        res.status_code(self.status);
        res.render(Json(json!({ "detail": detail })));
    }
}

impl EndpointOutRegister for ApiError {
    fn register(_components: &mut oapi::Components, operation: &mut oapi::Operation) {
        operation.responses.insert(
            "4XX",
            oapi::Response::new("Request error with a {\"detail\": …} body"),
        );
        operation
            .responses
            .insert("5XX", oapi::Response::new("Server error"));
    }
}
