// Capability ports: the seam between the orchestrator and the three
// external generative services. No concrete HTTP-backed implementation ships in
// this crate (scopes the services themselves out) — production binaries wire
// real implementations from outside; this crate ships deterministic fakes.

pub mod analyzer;
pub mod image_synthesizer;
pub mod text_synthesizer;

pub use analyzer::Analyzer;
pub use image_synthesizer::ImageSynthesizer;
pub use text_synthesizer::TextSynthesizer;

use thiserror::Error;

/// Error taxonomy a capability call can raise, classified independently
/// of the domain taxonomy so that stage adapters are the single place the
/// mapping between the two happens.
#[derive(Error, Debug, Clone)]
pub enum CapabilityError {
    #[error("bad image: {0}")]
    BadImage(String),

    #[error("auth error: {0}")]
    AuthError(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl CapabilityError {
    /// Maps a capability-level failure onto the domain taxonomy.
    pub fn into_domain(self) -> crate::domain::DomainError {
        use crate::domain::DomainError;
        match self {
            CapabilityError::BadImage(m) => DomainError::InvalidInput {
                field: "imageBuffer".to_string(),
                message: m,
            },
            CapabilityError::AuthError(m) => DomainError::AuthError(m),
            CapabilityError::RateLimit(m) => DomainError::RateLimit(m),
            CapabilityError::Timeout(m) => DomainError::Timeout(m),
            CapabilityError::Transient(m) => DomainError::Transient(m),
            CapabilityError::Fatal(m) => DomainError::Fatal(m),
        }
    }

    /// network-classified and rate-limited failures are retried; auth and
    /// fatal semantic rejections are not. `Timeout` is retried by the adapter's
    /// own attempt loop, not via this classifier (it already consumed one attempt).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CapabilityError::RateLimit(_) | CapabilityError::Timeout(_) | CapabilityError::Transient(_)
        )
    }
}
