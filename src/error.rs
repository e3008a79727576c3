/// Application error handling
///
/// Every failure in the service funnels into [`AppError`]. Handlers return
/// `Result<_, AppError>` and actix renders the error through
/// [`ResponseError`], which logs it with context and produces a uniform
/// [`ErrorResponse`] body that never carries internal detail.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::store::StoreError;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Field-level validation failures for request input
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    EmptyField(String),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(String, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(String, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(String),
    #[error("{0} contains suspicious content")]
    SuspiciousContent(String),
    #[error("{field}: {message}")]
    Rule { field: String, message: String },
}

impl ValidationError {
    /// Name of the offending field, returned to the client
    pub fn field(&self) -> &str {
        match self {
            ValidationError::EmptyField(field)
            | ValidationError::TooShort(field, _)
            | ValidationError::TooLong(field, _)
            | ValidationError::InvalidFormat(field)
            | ValidationError::SuspiciousContent(field) => field,
            ValidationError::Rule { field, .. } => field,
        }
    }

    pub fn rule(field: &str, message: impl Into<String>) -> Self {
        ValidationError::Rule {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Authentication and authorization failures
///
/// `InvalidCredentials` and `InvalidToken` deliberately do not say which
/// check failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        AppError::Auth(AuthError::Forbidden(reason.into()))
    }

    /// Status, machine-readable code and client-facing message
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid credentials".to_string(),
                ),
                AuthError::InvalidToken => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "Invalid token".to_string(),
                ),
                AuthError::Unauthorized => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Unauthorized".to_string(),
                ),
                AuthError::InvalidPassword => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_PASSWORD",
                    "Invalid password".to_string(),
                ),
                AuthError::Forbidden(reason) => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone())
                }
            },
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", capitalize(resource)),
            ),
            AppError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            AppError::Store(StoreError::Duplicate(_)) => (
                StatusCode::CONFLICT,
                "DUPLICATE_ENTRY",
                "Duplicate entry".to_string(),
            ),
            AppError::Store(StoreError::NotFound) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Resource not found".to_string(),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Rate limit exceeded. Please try again later.".to_string(),
            ),
            AppError::Store(_) | AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::debug!(error_id, field = e.field(), error = %e, "Validation error");
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id, error = %e, "Authentication error");
            }
            AppError::NotFound(_) | AppError::Conflict(_) | AppError::RateLimited => {
                tracing::info!(error_id, error = %self, "Request rejected");
            }
            AppError::Store(StoreError::Duplicate(_)) => {
                tracing::warn!(error_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Store(e) => {
                tracing::error!(error_id, error = %e, "Storage error");
            }
            AppError::Config(_) | AppError::Internal(_) => {
                tracing::error!(error_id, error = %self, "Internal error");
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// ============================================================================
/// 3. HTTP RESPONSE MAPPING
/// ============================================================================

/// Error body returned to clients
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Unique id, also present in the server log line for this error
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            field: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let (status, code, message) = self.classify();
        let mut body = ErrorResponse::new(error_id, message, code.to_string(), status.as_u16());
        if let AppError::Validation(e) = self {
            body = body.with_field(e.field());
        }

        HttpResponse::build(status).json(body)
    }
}
