use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Booking store error: {0}")]
    Store(#[from] StoreError),

    #[error("Payment provider error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Webhook rejected: {0}")]
    Signature(#[from] SignatureError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Errors raised by a booking store adapter
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Booking not found: {0}")]
    NotFound(String),

    #[error("Booking store unavailable: {0}")]
    Unavailable(String),

    #[error("Booking store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed booking record {id}: {reason}")]
    Malformed { id: String, reason: String },
}

/// Payment processor errors (session creation side)
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),

    #[error("Payment provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid payment amount: {0}")]
    InvalidAmount(String),

    #[error("Unexpected payment provider response: {0}")]
    UnexpectedResponse(String),
}

/// Webhook verification failures. None of these ever lead to a state mutation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing signature header")]
    MissingHeader,

    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),

    #[error("No signature matched the payload")]
    Mismatch,

    #[error("Timestamp outside tolerance ({age_secs}s old)")]
    StaleTimestamp { age_secs: i64 },

    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}

/// Notification delivery errors
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Email provider unavailable: {0}")]
    Unavailable(String),

    #[error("Email provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                msg,
                None,
            ),
            AppError::NotFound(id) | AppError::Store(StoreError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "BOOKING_NOT_FOUND",
                format!("Booking not found: {}", id),
                Some(serde_json::json!({ "id": id })),
            ),
            AppError::Store(e) => (
                StatusCode::BAD_GATEWAY,
                "STORE_UNAVAILABLE",
                e.to_string(),
                None,
            ),
            AppError::Payment(PaymentError::InvalidAmount(msg)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_AMOUNT",
                msg,
                None,
            ),
            AppError::Payment(e) => (
                StatusCode::BAD_GATEWAY,
                "PAYMENT_PROVIDER_ERROR",
                e.to_string(),
                None,
            ),
            AppError::Signature(e) => (
                StatusCode::BAD_REQUEST,
                "INVALID_SIGNATURE",
                format!("Webhook error: {}", e),
                None,
            ),
            AppError::Notification(e) => (
                StatusCode::BAD_GATEWAY,
                "NOTIFICATION_FAILED",
                e.to_string(),
                None,
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, _)| field.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        AppError::Validation(format!("Invalid fields: {}", fields))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
