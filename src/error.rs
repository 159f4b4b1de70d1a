//! Error taxonomy shared by the gateway, the generation requestors and the HTTP layer.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Bad input, rejected before any store or network call.
    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// The AI endpoint was unreachable, answered non-2xx, or sent nothing usable.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The AI endpoint answered, but neither parse stage found the expected JSON.
    #[error("could not parse generated content: {0}")]
    GenerationParse(String),

    #[error("not authenticated")]
    Auth,

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Storage(sqlx::Error::Migrate(Box::new(err)))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Generation(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Generation(_) | AppError::GenerationParse(_) => StatusCode::BAD_GATEWAY,
            AppError::Auth => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Short text shown to the user. Store internals stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Storage(_) => "the store rejected the request".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}
