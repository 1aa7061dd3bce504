// Application Layer - Use Cases and Business Logic

pub mod cancellation;
pub mod config;
pub mod job_store;
pub mod orchestrator;
pub mod pipeline_executor;
pub mod progress_bus;
pub mod retry;
pub mod scheduler;
pub mod stage_adapters;
pub mod ttl_reaper;
pub mod validation;

// Re-exports
pub use cancellation::CancellationToken;
pub use config::OrchestratorConfig;
pub use job_store::{JobStore, Subscription};
pub use orchestrator::{Orchestrator, SubmitOutcome, SystemStatus, WaitError, WaitOutcome};
pub use pipeline_executor::PipelineExecutor;
pub use progress_bus::{ProgressCallback, ProgressEvent, ProgressEventKind};
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{JobPermit, Scheduler};
pub use ttl_reaper::TtlReaper;
