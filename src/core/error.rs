use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::shared::types::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("No job named '{0}' is registered")]
    JobNotFound(String),

    #[error("Job instance already completed: {job_name} ({job_key})")]
    JobInstanceAlreadyComplete { job_name: String, job_key: String },

    #[error("Job execution already running: {job_name} ({job_key})")]
    JobExecutionAlreadyRunning { job_name: String, job_key: String },

    #[error("Illegal state: {0}")]
    IllegalState(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                    None,
                )
            }
            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "Redis error occurred".to_string(),
                    None,
                )
            }
            AppError::Io(ref e) => {
                tracing::error!("I/O error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Serialization(ref e) => (StatusCode::BAD_REQUEST, e.to_string(), None),
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Validation(ref msg) => (
                StatusCode::BAD_REQUEST,
                msg.clone(),
                Some(vec![msg.clone()]),
            ),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::JobNotFound(_) => (StatusCode::NOT_FOUND, self.to_string(), None),
            AppError::JobInstanceAlreadyComplete { .. }
            | AppError::JobExecutionAlreadyRunning { .. } => {
                (StatusCode::CONFLICT, self.to_string(), None)
            }
            AppError::IllegalState(ref msg) => (StatusCode::CONFLICT, msg.clone(), None),
        };

        let body = Json(ApiResponse::<()>::error(Some(message), errors));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_errors_map_to_status_codes() {
        let cases = [
            (
                AppError::JobNotFound("noSuchJob".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::JobInstanceAlreadyComplete {
                    job_name: "tokenCleanupJob".to_string(),
                    job_key: "time=1".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                AppError::JobExecutionAlreadyRunning {
                    job_name: "tokenCleanupJob".to_string(),
                    job_key: "time=1".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                AppError::Validation("blank key".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_job_error_messages() {
        let error = AppError::JobInstanceAlreadyComplete {
            job_name: "tokenCleanupJob".to_string(),
            job_key: "time=1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Job instance already completed: tokenCleanupJob (time=1)"
        );
    }
}
