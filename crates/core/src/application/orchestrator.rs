//! Orchestrator: the public surface consumed by transports. Owns the
//! Job Store, Scheduler, Pipeline Executor, and TTL Reaper, and is the only
//! thing a transport (HTTP, WS, CLI) needs to hold.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::domain::{DomainError, Job, JobId, JobState, SubmitOptions};
use crate::port::capabilities::analyzer::Analyzer;
use crate::port::capabilities::image_synthesizer::ImageSynthesizer;
use crate::port::capabilities::text_synthesizer::TextSynthesizer;
use crate::port::{IdProvider, TimeProvider};

use super::cancellation::CancellationToken;
use super::config::OrchestratorConfig;
use super::job_store::{JobStore, Subscription};
use super::pipeline_executor::{estimate_seconds, PipelineExecutor};
use super::progress_bus::{ProgressCallback, ProgressEventKind};
use super::scheduler::Scheduler;
use super::ttl_reaper::TtlReaper;
use super::validation::{self, CapabilityPresence};

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub job_id: JobId,
    pub current_status: JobState,
    pub estimated_seconds: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SystemStatus {
    pub active_count: usize,
    pub max_concurrent: usize,
    pub total_jobs: usize,
}

#[derive(Debug)]
pub enum WaitOutcome {
    Completed(Job),
    Failed(Job),
}

#[derive(Debug, PartialEq, Eq)]
pub enum WaitError {
    NotFound,
    Timeout,
}

pub struct Orchestrator {
    job_store: Arc<JobStore>,
    scheduler: Arc<Scheduler>,
    executor: Arc<PipelineExecutor>,
    cancellations: SyncMutex<HashMap<JobId, CancellationToken>>,
    reaper_handle: SyncMutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        analyzer: Arc<dyn Analyzer>,
        image_synthesizer: Arc<dyn ImageSynthesizer>,
        text_synthesizer: Arc<dyn TextSynthesizer>,
        time: Arc<dyn TimeProvider>,
        ids: Arc<dyn IdProvider>,
    ) -> Arc<Self> {
        let job_store = Arc::new(JobStore::new(time.clone(), ids));
        let scheduler = Arc::new(Scheduler::new(config.max_concurrent_jobs));
        let executor = Arc::new(PipelineExecutor::new(
            job_store.clone(),
            analyzer,
            image_synthesizer,
            text_synthesizer,
            config.clone(),
        ));

        let reaper_handle = if config.cleanup_interval_seconds > 0 {
            let reaper = TtlReaper::new(job_store.clone(), time, config.cleanup_interval(), config.job_ttl());
            Some(tokio::spawn(reaper.run()))
        } else {
            None
        };

        Arc::new(Self {
            job_store,
            scheduler,
            executor,
            cancellations: SyncMutex::new(HashMap::new()),
            reaper_handle: SyncMutex::new(reaper_handle),
        })
    }

    /// `Submit`: validates, admits, creates the record, launches the
    /// pipeline in the background, and returns immediately.
    pub fn submit(
        self: &Arc<Self>,
        image_bytes: Vec<u8>,
        options: SubmitOptions,
    ) -> Result<SubmitOutcome, DomainError> {
        validation::validate_image_bytes(&image_bytes)?;
        validation::validate_options(&options)?;
        validation::validate_capability_presence(
            &options,
            &CapabilityPresence {
                has_analyzer: true,
                has_image_synthesizer: true,
                has_text_synthesizer: true,
            },
        )?;

        let permit = self.scheduler.try_admit()?;
        let estimated_seconds = estimate_seconds(&options);
        let job = self.job_store.create(options);
        let cancellation = CancellationToken::new();
        self.cancellations
            .lock()
            .insert(job.id.clone(), cancellation.clone());

        let this = self.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            let _permit = permit;
            this.executor.run(job_id.clone(), image_bytes, cancellation).await;
            this.cancellations.lock().remove(&job_id);
        });

        Ok(SubmitOutcome {
            job_id: job.id,
            current_status: job.state,
            estimated_seconds,
        })
    }

    /// `GetStatus`.
    pub fn get_status(&self, job_id: &str) -> Option<Job> {
        self.job_store.get(job_id)
    }

    /// `ListJobs`.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.job_store.list()
    }

    /// `DeleteJob`.
    pub fn delete_job(&self, job_id: &str) -> bool {
        self.cancellations.lock().remove(job_id);
        self.job_store.delete(job_id)
    }

    /// `SubscribeProgress`.
    pub fn subscribe_progress(&self, job_id: &str, callback: ProgressCallback) -> Option<Subscription> {
        self.job_store.subscribe(job_id, callback)
    }

    /// Requests cooperative cancellation of an in-flight job. Not one of the
    /// core named operations, but a direct consequence of carrying a
    /// `CancellationToken` per job — exposed here since nothing else in this
    /// crate can reach it. Returns `false` if the job is not currently running.
    pub fn cancel_job(&self, job_id: &str) -> bool {
        match self.cancellations.lock().get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// `WaitForCompletion`. Resolves immediately if the job is already
    /// terminal (the replay event carries that state).
    pub async fn wait_for_completion(&self, job_id: &str, timeout: Duration) -> Result<WaitOutcome, WaitError> {
        if self.job_store.get(job_id).is_none() {
            return Err(WaitError::NotFound);
        }

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = std::sync::Mutex::new(Some(tx));
        let callback: ProgressCallback = Arc::new(move |event| {
            if matches!(event.kind, ProgressEventKind::Complete | ProgressEventKind::Error) {
                if let Some(sender) = tx.lock().unwrap().take() {
                    let _ = sender.send(());
                }
            }
        });

        let subscription = match self.job_store.subscribe(job_id, callback) {
            Some(sub) => sub,
            None => return Err(WaitError::NotFound),
        };

        let outcome = tokio::time::timeout(timeout, rx).await;
        subscription.unsubscribe().await;

        match outcome {
            Ok(_) => {
                let job = self.job_store.get(job_id).ok_or(WaitError::NotFound)?;
                if job.state == JobState::Completed {
                    Ok(WaitOutcome::Completed(job))
                } else {
                    Ok(WaitOutcome::Failed(job))
                }
            }
            Err(_) => Err(WaitError::Timeout),
        }
    }

    /// `SystemStatus`.
    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            active_count: self.scheduler.active_count(),
            max_concurrent: self.scheduler.max_concurrent_jobs(),
            total_jobs: self.job_store.len(),
        }
    }

    /// `Shutdown`: stops the reaper; in-flight jobs run to completion.
    pub fn shutdown(&self) {
        if let Some(handle) = self.reaper_handle.lock().take() {
            handle.abort();
            info!("orchestrator shutdown: TTL reaper stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::capabilities::analyzer::mocks::FakeAnalyzer;
    use crate::port::capabilities::image_synthesizer::mocks::FakeImageSynthesizer;
    use crate::port::capabilities::text_synthesizer::mocks::FakeTextSynthesizer;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::time_provider::mocks::FixedTimeProvider;

    fn test_orchestrator() -> Arc<Orchestrator> {
        let mut config = OrchestratorConfig::default();
        config.retry.initial_backoff_ms = 1;
        config.cleanup_interval_seconds = 0;
        Orchestrator::new(
            config,
            Arc::new(FakeAnalyzer::succeeding(FakeAnalyzer::default_record())),
            Arc::new(FakeImageSynthesizer::succeeding()),
            Arc::new(FakeTextSynthesizer::succeeding()),
            Arc::new(FixedTimeProvider::starting_at(1_000)),
            Arc::new(SequentialIdProvider::new("job")),
        )
    }

    fn jpeg() -> Vec<u8> {
        vec![0xFF, 0xD8, 0, 0, 0, 0, 0, 0]
    }

    #[tokio::test]
    async fn submit_then_wait_for_completion_resolves_completed() {
        let orchestrator = test_orchestrator();
        let outcome = orchestrator.submit(jpeg(), SubmitOptions::default()).unwrap();
        assert_eq!(outcome.current_status, JobState::Pending);
        assert!(outcome.estimated_seconds > 0);

        let result = orchestrator
            .wait_for_completion(&outcome.job_id, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(matches!(result, WaitOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn wait_for_completion_on_unknown_job_is_not_found() {
        let orchestrator = test_orchestrator();
        let err = orchestrator
            .wait_for_completion("does-not-exist", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, WaitError::NotFound);
    }

    #[tokio::test]
    async fn submit_rejects_invalid_image_bytes_without_creating_a_job() {
        let orchestrator = test_orchestrator();
        let err = orchestrator.submit(vec![], SubmitOptions::default()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput { .. }));
        assert_eq!(orchestrator.list_jobs().len(), 0);
    }

    #[tokio::test]
    async fn submit_beyond_capacity_fails_with_capacity_exhausted() {
        let mut config = OrchestratorConfig::default();
        config.max_concurrent_jobs = 1;
        config.retry.initial_backoff_ms = 1;
        config.cleanup_interval_seconds = 0;
        let orchestrator = Orchestrator::new(
            config,
            Arc::new(FakeAnalyzer::new(
                crate::port::capabilities::analyzer::mocks::MockBehavior::Timeout(Duration::from_secs(5)),
            )),
            Arc::new(FakeImageSynthesizer::succeeding()),
            Arc::new(FakeTextSynthesizer::succeeding()),
            Arc::new(FixedTimeProvider::starting_at(1_000)),
            Arc::new(SequentialIdProvider::new("job")),
        );
        let _first = orchestrator.submit(jpeg(), SubmitOptions::default()).unwrap();
        let err = orchestrator.submit(jpeg(), SubmitOptions::default()).unwrap_err();
        assert!(matches!(err, DomainError::CapacityExhausted { .. }));
    }

    #[tokio::test]
    async fn delete_job_removes_it_and_second_delete_returns_false() {
        let orchestrator = test_orchestrator();
        let outcome = orchestrator.submit(jpeg(), SubmitOptions::default()).unwrap();
        orchestrator
            .wait_for_completion(&outcome.job_id, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(orchestrator.delete_job(&outcome.job_id));
        assert!(!orchestrator.delete_job(&outcome.job_id));
        assert!(orchestrator.get_status(&outcome.job_id).is_none());
    }

    #[tokio::test]
    async fn system_status_reports_configured_ceiling() {
        let orchestrator = test_orchestrator();
        let status = orchestrator.system_status();
        assert_eq!(status.max_concurrent, 5);
        assert_eq!(status.total_jobs, 0);
    }

    #[tokio::test]
    async fn cancel_job_interrupts_an_in_flight_job() {
        let mut config = OrchestratorConfig::default();
        config.retry.initial_backoff_ms = 1;
        config.cleanup_interval_seconds = 0;
        let orchestrator = Orchestrator::new(
            config,
            Arc::new(FakeAnalyzer::new(
                crate::port::capabilities::analyzer::mocks::MockBehavior::Timeout(Duration::from_secs(5)),
            )),
            Arc::new(FakeImageSynthesizer::succeeding()),
            Arc::new(FakeTextSynthesizer::succeeding()),
            Arc::new(FixedTimeProvider::starting_at(1_000)),
            Arc::new(SequentialIdProvider::new("job")),
        );
        let outcome = orchestrator.submit(jpeg(), SubmitOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(orchestrator.cancel_job(&outcome.job_id));

        let result = orchestrator
            .wait_for_completion(&outcome.job_id, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(matches!(result, WaitOutcome::Failed(_)));
    }
}
