//! Error types for Wheelhouse
//!
//! One taxonomy for the whole core. Storage-race errors (`Conflict`,
//! `StaleState`) are surfaced to the caller for a user-driven retry;
//! upstream gateway errors are retryable with backoff; business-rule
//! errors are terminal for the attempt and shown to the user as-is.

use hyper::StatusCode;

/// Main error type for Wheelhouse operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An overlapping active booking existed at commit time.
    #[error("Booking conflict: {0}")]
    Conflict(String),

    /// The requested status change is outside the lifecycle table.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The booking is in a terminal state and can never change again.
    #[error("Booking is immutable: {0}")]
    Immutable(String),

    /// Lost a race on a status update; re-read and retry with fresh state.
    #[error("Stale state: {0}")]
    StaleState(String),

    /// The actor does not own the entity it is trying to act on.
    #[error("Ownership mismatch: {0}")]
    OwnershipMismatch(String),

    /// Gateway-reported amount does not match the recorded amount.
    #[error("Amount mismatch: expected {expected}, gateway reported {actual}")]
    AmountMismatch { expected: u64, actual: u64 },

    /// An identical settlement attempt is already in flight.
    #[error("Duplicate settlement attempt in flight: {0}")]
    DuplicateInFlight(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Payment gateway unreachable or returned a server error; retryable.
    #[error("Payment gateway unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Immutable(_) => StatusCode::CONFLICT,
            Self::StaleState(_) => StatusCode::CONFLICT,
            Self::OwnershipMismatch(_) => StatusCode::FORBIDDEN,
            Self::AmountMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DuplicateInFlight(_) => StatusCode::CONFLICT,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable wire code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::Immutable(_) => "IMMUTABLE",
            Self::StaleState(_) => "STALE_STATE",
            Self::OwnershipMismatch(_) => "OWNERSHIP_MISMATCH",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::DuplicateInFlight(_) => "DUPLICATE_IN_FLIGHT",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::Config(_) => "CONFIG",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the caller may safely retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for CoreError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamUnavailable(err.to_string())
    }
}

/// Result type alias for Wheelhouse operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CoreError::Conflict("overlap".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CoreError::RateLimited("slow down".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            CoreError::UpstreamUnavailable("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_only_upstream_is_retryable() {
        assert!(CoreError::UpstreamUnavailable("502".into()).is_retryable());
        assert!(!CoreError::AmountMismatch { expected: 3000, actual: 2999 }.is_retryable());
        assert!(!CoreError::Conflict("overlap".into()).is_retryable());
    }
}
