use crate::error::ScribeError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error carrying the status code it maps to
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ScribeError> for ApiError {
    fn from(err: ScribeError) -> Self {
        let status = match &err {
            ScribeError::JobNotFound(_) | ScribeError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ScribeError::SessionClosed(_)
            | ScribeError::AlreadyCommitted { .. }
            | ScribeError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ScribeError::ChunkLimitExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ScribeError::DispatcherClosed => StatusCode::SERVICE_UNAVAILABLE,
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!("Request failed: {}", self.message);
        }

        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
