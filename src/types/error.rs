//! Error types for Turnstile
//!
//! Two layers: [`AuthError`] carries the precise reason an authentication
//! step failed and is only ever logged; [`TurnstileError`] is what handlers
//! turn into HTTP responses. Every `AuthError` reaches the client as a bare
//! 401 so that no oracle leaks through the response body.

use hyper::StatusCode;

/// Why an authentication step was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("malformed elliptic-curve key")]
    InvalidKey,

    #[error("sealed field could not be opened")]
    DecryptionFailed,

    #[error("token signature invalid")]
    SignatureInvalid,

    #[error("token expired")]
    Expired,

    #[error("token issued for a different audience")]
    WrongAudience,

    #[error("token revoked")]
    Revoked,

    #[error("token claims do not match")]
    ClaimsMismatch,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("malformed bearer material")]
    Malformed,

    #[error("credentials rejected")]
    InvalidCredentials,
}

/// Main error type for Turnstile operations
#[derive(Debug, thiserror::Error)]
pub enum TurnstileError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl TurnstileError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Http(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to hand back to the client.
    ///
    /// Authentication failures collapse to a single generic string; storage
    /// and internal failures hide their detail as well.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(_) => "Unauthorized".to_string(),
            Self::Storage(_) => "Service temporarily unavailable".to_string(),
            Self::Config(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// The authentication reason, if this is an authentication failure.
    pub fn auth_reason(&self) -> Option<&AuthError> {
        match self {
            Self::Unauthorized(reason) => Some(reason),
            _ => None,
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.public_message();
        (status, body)
    }
}

impl From<std::io::Error> for TurnstileError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for TurnstileError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

/// Result type alias for Turnstile operations
pub type Result<T> = std::result::Result<T, TurnstileError>;
