//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use clipforge_ledger::LedgerError;
use serde_json::json;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Webhook / payment errors
    #[error("Signature verification failed")]
    SignatureVerificationFailed,
    #[error("Payment not yet confirmed")]
    PaymentNotConfirmed,

    // Validation errors
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // Resource errors
    #[error("Resource not found")]
    NotFound,

    // Upstream errors
    #[error("Payment provider unavailable")]
    ProviderUnavailable,

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Authentication
            ApiError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", self.to_string())
            }
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string())
            }
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),

            // Webhooks / payments
            ApiError::SignatureVerificationFailed => (
                StatusCode::UNAUTHORIZED,
                "SIGNATURE_VERIFICATION_FAILED",
                self.to_string(),
            ),
            ApiError::PaymentNotConfirmed => (
                StatusCode::PAYMENT_REQUIRED,
                "PAYMENT_NOT_CONFIRMED",
                "Payment not yet confirmed. Retry after completing checkout.".to_string(),
            ),

            // Validation
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            // Resources
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),

            // Upstream
            ApiError::ProviderUnavailable => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_UNAVAILABLE",
                self.to_string(),
            ),

            // Internal. Detail stays in the logs, not the response.
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database error".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AuthenticationFailure => ApiError::SignatureVerificationFailed,
            LedgerError::MalformedPayload(msg) => ApiError::BadRequest(msg),
            LedgerError::UnsupportedEvent(msg) => ApiError::BadRequest(msg),
            LedgerError::PaymentNotConfirmed => ApiError::PaymentNotConfirmed,
            LedgerError::RecordNotFound(_) => ApiError::NotFound,
            LedgerError::ProviderApi(msg) => {
                tracing::error!(error = %msg, "Payment provider API error");
                ApiError::ProviderUnavailable
            }
            LedgerError::Database(msg) => ApiError::Database(msg),
            LedgerError::Config(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                ApiError::Internal
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
