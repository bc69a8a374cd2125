//! Common error types for services

use thiserror::Error;

/// Service error types
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller could not be identified
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is identified but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid request error
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limited error
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A caller-enforced precondition was violated. Always a server fault.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// HTTP status code this error surfaces as
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::InvalidRequest(_) => 400,
            Self::RateLimited(_) => 429,
            Self::PreconditionFailed(_) | Self::InternalError(_) => 500,
        }
    }

    /// Stable machine-readable code for response bodies
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidRequest(_) => "invalid_request",
            Self::RateLimited(_) => "rate_limit_exceeded",
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Whether the failure is the server's fault rather than the caller's
    #[must_use]
    pub const fn is_server_fault(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
