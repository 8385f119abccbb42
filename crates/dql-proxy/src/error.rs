use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dql_core::{ExecutionError, RequestError};
use serde_json::json;
use thiserror::Error;

/// Everything a handler can fail with, mapped onto an HTTP status.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing or invalid Authorization header")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error(transparent)]
    BadRequest(#[from] RequestError),

    #[error("DT_URL/DT_TOKEN not configured")]
    NotConfigured,

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotConfigured | ApiError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Execution(err) => match err {
                ExecutionError::Auth { status, .. } => match *status {
                    403 => StatusCode::FORBIDDEN,
                    _ => StatusCode::UNAUTHORIZED,
                },
                ExecutionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                ExecutionError::Transport(_)
                | ExecutionError::Upstream { .. }
                | ExecutionError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotConfigured => "not_configured",
            ApiError::Metrics(_) => "internal_error",
            ApiError::Execution(err) => err.kind().as_str(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.kind(),
            "detail": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
