// Normalized error taxonomy: one variant per error kind, carrying exactly the
// structured fields downstream payloads need.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("invalid input: {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("capacity exhausted: {current}/{max} active jobs")]
    CapacityExhausted { current: usize, max: usize },

    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("fatal upstream error: {0}")]
    Fatal(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl DomainError {
    /// The string tag, used in log fields and in `ProgressEvent`/payload JSON.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::InvalidInput { .. } => "InvalidInput",
            DomainError::CapacityExhausted { .. } => "CapacityExhausted",
            DomainError::AuthError(_) => "AuthError",
            DomainError::RateLimit(_) => "RateLimit",
            DomainError::Timeout(_) => "Timeout",
            DomainError::NetworkError(_) => "NetworkError",
            DomainError::Transient(_) => "Transient",
            DomainError::Fatal(_) => "Fatal",
            DomainError::Cancelled(_) => "Cancelled",
            DomainError::JobNotFound(_) => "JobNotFound",
            DomainError::InvalidStateTransition { .. } => "InvalidStateTransition",
            DomainError::Unknown(_) => "Unknown",
        }
    }

    /// retried kinds vs. not. `Unknown` is treated as `Transient`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::RateLimit(_)
                | DomainError::NetworkError(_)
                | DomainError::Transient(_)
                | DomainError::Unknown(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
