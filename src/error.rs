//! Error types for LibraBook server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Book {0} is already borrowed")]
    AlreadyBorrowed(i32),

    #[error("Book '{0}' is not borrowed by this user")]
    NotBorrowedByUser(String),

    #[error("Email delivery failed: {0}")]
    EmailDeliveryFailed(String),

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when a storage error comes from a unique index rejecting the write
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Storage(e) => e
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::IncorrectPassword | AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_)
            | AppError::AlreadyBorrowed(_)
            | AppError::NotBorrowedByUser(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::EmailDeliveryFailed(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NotFound",
            AppError::AlreadyExists(_) => "AlreadyExists",
            AppError::IncorrectPassword => "IncorrectPassword",
            AppError::Unauthenticated(_) => "Unauthenticated",
            AppError::Forbidden(_) => "Forbidden",
            AppError::AlreadyBorrowed(_) => "AlreadyBorrowed",
            AppError::NotBorrowedByUser(_) => "NotBorrowedByUser",
            AppError::EmailDeliveryFailed(_) => "EmailDeliveryFailed",
            AppError::Storage(_) => "StorageError",
            AppError::Validation(_) => "Validation",
            AppError::RateLimited => "RateLimited",
            AppError::Internal(_) => "Internal",
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AppError::Storage(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::EmailDeliveryFailed(msg) => {
                tracing::error!("Email delivery failed: {}", msg);
                "Could not send email".to_string()
            }
            AppError::IncorrectPassword => "Invalid email or password".to_string(),
            AppError::NotFound(msg)
            | AppError::AlreadyExists(msg)
            | AppError::Unauthenticated(msg)
            | AppError::Forbidden(msg)
            | AppError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
