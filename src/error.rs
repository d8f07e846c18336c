use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use thiserror::Error;

use crate::relay::CompletionError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid or expired session")]
    InvalidToken,

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Ownership(String),

    #[error("{0}")]
    NotFound(String),

    #[error("A chat named \"{0}\" already exists")]
    DuplicateChat(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateChat(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::InvalidToken | AppError::Auth(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Ownership(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Completion(_)
            | AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration failed: {}", err))
    }
}

impl From<CompletionError> for AppError {
    fn from(err: CompletionError) -> Self {
        AppError::Completion(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

// Axum IntoResponse implementation for HTTP errors
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        let message = match &self {
            AppError::Database(err) => {
                tracing::error!("❌ Database error: {}", err);
                "An unexpected error occurred".to_string()
            }
            AppError::Completion(detail) => {
                // Provider bodies can echo credentials
                tracing::error!("❌ Completion error: {}", detail);
                "Failed to get response from Krishna".to_string()
            }
            AppError::Config(_) | AppError::Internal(_) => {
                tracing::error!("❌ {}", self);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = serde_json::json!({
            "success": false,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
