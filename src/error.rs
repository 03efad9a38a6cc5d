/// Error Handling Module
///
/// A single error type for the whole service:
/// 1. Domain-specific error enums (validation, auth, store, config)
/// 2. `AppError` as the control-flow error every operation returns
/// 3. HTTP response mapping with a uniform JSON envelope
/// 4. Structured logging per error class, with request context

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required fields are absent; carries the user-facing message
    MissingFields(String),
    PasswordMismatch(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingFields(msg) => write!(f, "{}", msg),
            ValidationError::PasswordMismatch(msg) => write!(f, "{}", msg),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} must be at least {} characters", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} must be at most {} characters", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Credential store failures
#[derive(Debug)]
pub enum StoreError {
    UniqueViolation(String),
    Unavailable(String),
    Query(String),
    /// A stored row could not be mapped back into a principal
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UniqueViolation(msg) => write!(f, "Duplicate entry: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
            StoreError::Query(msg) => write!(f, "Query error: {}", msg),
            StoreError::Corrupt(msg) => write!(f, "Corrupt record: {}", msg),
        }
    }
}

impl StdError for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

/// Authentication failures.
///
/// Every variant maps to 401; the variant itself is kept for logs so that
/// an expired token can be told apart from a forged one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    MissingToken,
    TokenExpired,
    TokenInvalid,
    /// Refresh token does not match the principal's current slot
    SessionSuperseded,
    PrincipalNotFound,
    WrongCurrentPassword,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::MissingToken => write!(f, "Access token required"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenInvalid => write!(f, "Invalid token"),
            AuthError::SessionSuperseded => write!(f, "Refresh token has been superseded"),
            AuthError::PrincipalNotFound => write!(f, "User not found"),
            AuthError::WrongCurrentPassword => write!(f, "Current password is incorrect"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Conflict(String),
    Auth(AuthError),
    NotFound(String),
    Store(StoreError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Conflict(msg) => write!(f, "{}", msg),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(_) => {
                AppError::Conflict("Email already registered".to_string())
            }
            other => AppError::Store(other),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error envelope returned for every failed request
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Request id for correlating with server logs
    pub error_id: String,
    /// Human-readable message
    pub error: String,
    /// Stable code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, error: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            error,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, "EMAIL_CONFLICT", msg.clone()),
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    e.to_string(),
                ),
                AuthError::MissingToken => {
                    (StatusCode::UNAUTHORIZED, "MISSING_TOKEN", e.to_string())
                }
                AuthError::TokenExpired | AuthError::TokenInvalid => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID",
                    "Invalid or expired token".to_string(),
                ),
                AuthError::SessionSuperseded => (
                    StatusCode::UNAUTHORIZED,
                    "SESSION_INVALID",
                    "Invalid refresh token".to_string(),
                ),
                AuthError::PrincipalNotFound => {
                    (StatusCode::UNAUTHORIZED, "PRINCIPAL_NOT_FOUND", e.to_string())
                }
                AuthError::WrongCurrentPassword => {
                    (StatusCode::UNAUTHORIZED, "WRONG_PASSWORD", e.to_string())
                }
            },
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            // Store and internal failures never leak details to the caller
            AppError::Store(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.parts();
        let error_response = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );
        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Conflict(msg) => {
                tracing::warn!(request_id = request_id, error = %msg, "Duplicate email attempt");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, reason = ?e, "Authentication error");
            }
            AppError::NotFound(msg) => {
                tracing::info!(request_id = request_id, error = %msg, "Resource not found");
            }
            AppError::Store(e) => {
                tracing::error!(request_id = request_id, error = %e, "Credential store error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        self.parts().0
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-operation context carried through handlers for log correlation
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "user_id": self.user_id,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        match error {
            AppError::Store(_) | AppError::Internal(_) => {
                tracing::error!(error = %error, context = ?context, "Operation failed");
            }
            _ => {
                tracing::warn!(error = %error, context = ?context, "Operation rejected");
            }
        }
    }
}
