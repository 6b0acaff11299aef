//! Error types for Octolink
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Besides the usual HTTP-facing variants this carries the identity
/// resolution taxonomy (`Provider`, `ProviderDenied`, `Conflict`,
/// `InvalidProfile`). The GitHub callback converts those into a generic
/// login failure; the variant is kept for logging and metrics only.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// OAuth handshake with the provider failed (502)
    #[error("Provider error: {0}")]
    Provider(String),

    /// User declined authorization at the provider (403)
    #[error("Provider authorization denied")]
    ProviderDenied,

    /// Uniqueness constraint violated in the credential store (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Account linking refused by policy (409)
    #[error("Link refused: {0}")]
    LinkRefused(String),

    /// Provider adapter produced an unusable profile (500)
    #[error("Invalid provider profile: {0}")]
    InvalidProfile(String),

    /// Signature verification failed (401)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption/hashing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database",
            AppError::HttpClient(_) => "http_client",
            AppError::Provider(_) => "provider",
            AppError::ProviderDenied => "provider_denied",
            AppError::Conflict(_) => "conflict",
            AppError::LinkRefused(_) => "link_refused",
            AppError::InvalidProfile(_) => "invalid_profile",
            AppError::InvalidSignature => "invalid_signature",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }

    /// Map unique-constraint violations to `Conflict`, everything else to `Database`.
    pub fn from_write(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                return AppError::Conflict(db_error.message().to_string());
            }
        }
        AppError::Database(error)
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Unauthorized | AppError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AppError::ProviderDenied => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(_) | AppError::LinkRefused(_) => {
                (StatusCode::CONFLICT, "Conflict".to_string())
            }
            AppError::HttpClient(_) | AppError::Provider(_) => {
                (StatusCode::BAD_GATEWAY, "Upstream provider error".to_string())
            }
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::InvalidProfile(_)
            | AppError::Config(_)
            | AppError::Encryption(_)
            | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.kind()])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
