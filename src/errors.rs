use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::ai::extraction::ExtractionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {0} has already finished; restart it to book again")]
    SessionClosed(String),

    #[error("unsupported conversation mode: {0}")]
    UnsupportedMode(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("could not understand the message, please try again ({0})")]
    Extraction(#[from] ExtractionError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::SessionClosed(_) => StatusCode::CONFLICT,
            AppError::UnsupportedMode(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Extraction(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
