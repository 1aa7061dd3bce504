// Crate-level umbrella error type

use thiserror::Error;

/// Crate-level error type, used at the capability-port boundary and anywhere a
/// function needs to return more than a normalized domain failure.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("capability error: {0}")]
    Capability(#[from] crate::port::capabilities::CapabilityError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
