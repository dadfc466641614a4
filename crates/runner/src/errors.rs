//! Runner error responses.
//!
//! The control plane branches on the stable codes in the `{"detail": …}`
//! body, so statuses and codes here are part of the wire contract.

use salvo::{Depot, Request, Response, Writer, http::StatusCode, prelude::Json};
use serde_json::json;

use crate::driver::{DriverError, DriverErrorKind};

#[derive(Debug)]
pub(crate) struct WorkerApiError {
    status: StatusCode,
    code: String,
    message: String,
}

impl WorkerApiError {
    pub(crate) fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missing_bearer_token", message)
    }

    pub(crate) fn forbidden(code: &str, message: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
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
}

impl From<&DriverError> for WorkerApiError {
    fn from(error: &DriverError) -> Self {
        let status = match error.kind {
            DriverErrorKind::InvalidTenantId | DriverErrorKind::InvalidArtifactName => {
                StatusCode::BAD_REQUEST
            }
            DriverErrorKind::TenantNotFound | DriverErrorKind::ComposeMissing => {
                StatusCode::NOT_FOUND
            }
            DriverErrorKind::EngineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            DriverErrorKind::EngineFailed => StatusCode::BAD_GATEWAY,
            DriverErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            DriverErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self::new(status, error.kind.code(), error.message.clone())
    }
}

#[salvo::async_trait]
impl Writer for WorkerApiError {
    async fn write(mut self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        res.status_code(self.status);
        res.render(Json(json!({
            "detail": {
                "error": self.code,
                "message": self.message,
            }
        })));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_kinds_map_to_contract_statuses() {
        let error = DriverError::new(DriverErrorKind::EngineUnavailable, "docker down");
        let api: WorkerApiError = (&error).into();

        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api.code, "docker_unavailable");

        let error = DriverError::new(DriverErrorKind::ComposeMissing, "no compose");
        let api: WorkerApiError = (&error).into();

        assert_eq!(api.status, StatusCode::NOT_FOUND);
    }
}
