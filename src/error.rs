use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    MissingHeader(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("intake queue is full")]
    QueueFull,

    #[error("service is shutting down")]
    ShuttingDown,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingHeader(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::BodyRead(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::QueueFull | AppError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            AppError::BodyRead(msg) => {
                tracing::warn!(error = %msg, "unreadable request body");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Failure of a single persistence attempt.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::MissingHeader("No user ID in the request header").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Validation("bad json".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::BodyRead("reset".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::QueueFull.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            AppError::ShuttingDown.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_missing_header_message_is_verbatim() {
        let err = AppError::MissingHeader("No user Agent in the request header");
        assert_eq!(err.to_string(), "No user Agent in the request header");
    }
}
