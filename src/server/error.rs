use crate::control::{ControlError, ErrorKind};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Structured error body: `{ "kind", "message", "retryable" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

/// Control plane error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ControlError);

impl From<ControlError> for ApiError {
    fn from(error: ControlError) -> Self {
        ApiError(error)
    }
}

pub fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict
        | ErrorKind::InvalidRequest
        | ErrorKind::SpawnFailure
        | ErrorKind::ConfigInvalid => StatusCode::BAD_REQUEST,
        ErrorKind::TerminationFailure | ErrorKind::PersistenceFailure => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorKind::UpstreamUnreachable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::UpstreamEmpty | ErrorKind::UpstreamInvalidResponse => StatusCode::BAD_GATEWAY,
        ErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_code(kind);
        if status.is_server_error() {
            warn!("Request failed ({:?}): {}", kind, self.0);
        } else {
            debug!("Request rejected ({:?}): {}", kind, self.0);
        }

        let body = ErrorBody {
            kind,
            message: self.0.to_string(),
            retryable: kind.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
