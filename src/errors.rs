use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Conflict(String),

    #[error("no available occurrences to book for the selected package")]
    NoAvailability,

    #[error("invalid total amount (<= 0), check the field's price per session")]
    InvalidAmount,

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NoAvailability => StatusCode::BAD_REQUEST,
            AppError::InvalidAmount => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::Validation { field, message } => {
                serde_json::json!({ "error": message, "field": field })
            }
            AppError::Gateway(detail) => {
                tracing::warn!(error = %detail, "payment gateway failure");
                serde_json::json!({ "error": "failed to reach the payment provider, please retry" })
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                serde_json::json!({ "error": "internal server error" })
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                serde_json::json!({ "error": "internal server error" })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}
