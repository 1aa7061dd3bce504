// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;

// Re-exports
pub use error::DomainError;
pub use job::{
    Job, JobId, JobResult, JobState, ProgressMap, Stage, StageStatus, SubmitOptions,
    DEFAULT_AD_PLATFORMS,
};
