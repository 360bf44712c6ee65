/// Error types for network-service
///
/// Store failures are classified once, in `StoreError`, and translated into the
/// HTTP taxonomy by `AppError`. Raw storage messages are logged, never returned
/// to callers.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::domain::connection::ConnectionError;

/// Failures raised by the account store and post repository
#[derive(Error, Debug)]
pub enum StoreError {
    /// Datastore cannot be reached (pool timeout, io, closed pool)
    #[error("Datastore unavailable: {0}")]
    Unavailable(String),

    /// The two sides of a relation disagree. Never repaired silently.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Concurrent write collided (serialization failure, deadlock, unique violation)
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            sqlx::Error::Database(db_err)
                if matches!(
                    db_err.code().as_deref(),
                    Some("40001") | Some("40P01") | Some("23505")
                ) =>
            {
                StoreError::Conflict(db_err.message().to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Boundary error translated into HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connection request conflicts (self, duplicate, reverse, already connected)
    #[error("{0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::Unavailable(msg),
            StoreError::Conflict(msg) => AppError::Unavailable(msg),
            StoreError::Integrity(msg) => AppError::Integrity(msg),
            StoreError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<ConnectionError> for AppError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::SelfRequest
            | ConnectionError::AlreadyConnected
            | ConnectionError::DuplicateRequest
            | ConnectionError::ReverseRequestExists => AppError::Conflict(err.to_string()),
            ConnectionError::NoSuchRequest | ConnectionError::AccountNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            ConnectionError::Store(e) => e.into(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Integrity(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_msg = match self {
            AppError::Integrity(detail) => {
                tracing::error!(detail = %detail, "Request aborted on relation integrity violation");
                "Internal server error".to_string()
            }
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "Request failed with internal error");
                "Internal server error".to_string()
            }
            AppError::Unavailable(detail) => {
                tracing::warn!(detail = %detail, "Datastore unavailable");
                "Service temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": error_msg,
            "status": status.as_u16(),
        }))
    }
}
