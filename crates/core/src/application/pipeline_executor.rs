//! Pipeline Executor: drives the stage DAG for one admitted job —
//! Analysis as a mandatory sequential gate, then Packages/Ads/Texts as
//! independent concurrent branches.
//!
//! Follows the same spawn-await-apply shape as the rest of this crate's
//! background work (spawn an isolated unit of work, await its outcome, apply
//! the result to the store), generalized from one task per job to four stage
//! tasks per job.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::{DomainError, JobId, Stage, SubmitOptions};
use crate::port::capabilities::analyzer::Analyzer;
use crate::port::capabilities::image_synthesizer::ImageSynthesizer;
use crate::port::capabilities::text_synthesizer::{TextContext, TextSynthesizer};

use super::cancellation::CancellationToken;
use super::config::OrchestratorConfig;
use super::job_store::JobStore;
use super::stage_adapters::{AdAdapter, AnalysisAdapter, PackageAdapter, TextAdapter};

/// Polls `token` every 25ms while `fut` runs. Returns `None` if cancellation
/// is observed before `fut` resolves — the only forceful-looking part of an
/// otherwise cooperative scheme; the in-flight capability call itself is
/// simply abandoned (dropped), which is the limit of what "no forceful
/// thread interruption" promises for an already-dispatched async call.
async fn cancellable<T>(token: &CancellationToken, fut: impl std::future::Future<Output = T>) -> Option<T> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            result = &mut fut => return Some(result),
            _ = tokio::time::sleep(Duration::from_millis(25)) => {
                if token.is_cancelled() {
                    return None;
                }
            }
        }
    }
}

pub struct PipelineExecutor {
    job_store: Arc<JobStore>,
    analyzer: Arc<dyn Analyzer>,
    image_synthesizer: Arc<dyn ImageSynthesizer>,
    text_synthesizer: Arc<dyn TextSynthesizer>,
    config: OrchestratorConfig,
}

impl PipelineExecutor {
    pub fn new(
        job_store: Arc<JobStore>,
        analyzer: Arc<dyn Analyzer>,
        image_synthesizer: Arc<dyn ImageSynthesizer>,
        text_synthesizer: Arc<dyn TextSynthesizer>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            job_store,
            analyzer,
            image_synthesizer,
            text_synthesizer,
            config,
        }
    }

    /// Drives one job end to end. Intended to be handed to `tokio::spawn` by
    /// the Orchestrator; holds the job's admission `JobPermit` for its whole
    /// lifetime via the caller (see `orchestrator.rs`).
    pub async fn run(&self, job_id: JobId, image_bytes: Vec<u8>, cancellation: CancellationToken) {
        if let Err(e) = self.job_store.start(&job_id) {
            error!(job_id = %job_id, error = %e, "failed to start job");
            return;
        }

        let options = match self.job_store.get(&job_id) {
            Some(job) => job.options,
            None => return,
        };

        let analysis = match self.run_analysis(&job_id, &image_bytes, &cancellation).await {
            Some(record) => record,
            None => return,
        };

        self.run_branches(&job_id, &analysis, &options, &cancellation).await;

        match self.job_store.complete(&job_id) {
            Ok(()) => info!(job_id = %job_id, "job completed"),
            Err(e) => warn!(job_id = %job_id, error = %e, "could not complete job (already terminal)"),
        }
    }

    async fn run_analysis(
        &self,
        job_id: &str,
        image_bytes: &[u8],
        cancellation: &CancellationToken,
    ) -> Option<crate::port::capabilities::analyzer::AnalysisRecord> {
        if let Err(e) = self.job_store.start_stage(job_id, Stage::Analysis) {
            error!(job_id = %job_id, error = %e, "failed to start analysis stage");
            return None;
        }

        let adapter = AnalysisAdapter::new(
            self.analyzer.clone(),
            self.config.retry,
            Duration::from_millis(self.config.stage_timeouts.analysis_millis),
        );

        let outcome = cancellable(cancellation, adapter.run(image_bytes)).await;
        match outcome {
            None => {
                let _ = self.job_store.finish_stage_failure(job_id, Stage::Analysis);
                let _ = self.job_store.fail(job_id, "cancelled during analysis");
                None
            }
            Some(Err(e)) => {
                let _ = self.job_store.finish_stage_failure(job_id, Stage::Analysis);
                let _ = self.job_store.fail(job_id, e.to_string());
                None
            }
            Some(Ok(record)) => {
                let value = serde_json::to_value(&record).unwrap_or(serde_json::Value::Null);
                let _ = self
                    .job_store
                    .finish_stage_success(job_id, Stage::Analysis, |r| r.analysis = Some(value));
                Some(record)
            }
        }
    }

    async fn run_branches(
        &self,
        job_id: &str,
        analysis: &crate::port::capabilities::analyzer::AnalysisRecord,
        options: &SubmitOptions,
        cancellation: &CancellationToken,
    ) {
        let packages = self.run_packages_branch(job_id, analysis, options, cancellation);
        let ads = self.run_ads_branch(job_id, analysis, options, cancellation);
        let texts = self.run_texts_branch(job_id, analysis, options, cancellation);
        tokio::join!(packages, ads, texts);
    }

    async fn run_packages_branch(
        &self,
        job_id: &str,
        analysis: &crate::port::capabilities::analyzer::AnalysisRecord,
        options: &SubmitOptions,
        cancellation: &CancellationToken,
    ) {
        if options.skip_packages {
            return;
        }
        if self.job_store.start_stage(job_id, Stage::Packages).is_err() {
            return;
        }
        let adapter = PackageAdapter::new(
            self.image_synthesizer.clone(),
            self.config.retry,
            Duration::from_millis(self.config.stage_timeouts.image_synthesis_millis),
            self.config.intra_branch_concurrency,
        );
        match cancellable(cancellation, adapter.run(analysis, options)).await {
            None => {
                let _ = self.job_store.finish_stage_failure(job_id, Stage::Packages);
            }
            Some(results) => {
                let packages: Vec<serde_json::Value> = results
                    .into_iter()
                    .filter_map(|r| match r {
                        Ok(value) => Some(value),
                        Err(e) => {
                            warn!(job_id = %job_id, error = %e, "package variation failed");
                            None
                        }
                    })
                    .collect();
                if packages.is_empty() {
                    let _ = self.job_store.finish_stage_failure(job_id, Stage::Packages);
                } else {
                    let _ = self
                        .job_store
                        .finish_stage_success(job_id, Stage::Packages, |r| r.packages = Some(packages));
                }
            }
        }
    }

    async fn run_ads_branch(
        &self,
        job_id: &str,
        analysis: &crate::port::capabilities::analyzer::AnalysisRecord,
        options: &SubmitOptions,
        cancellation: &CancellationToken,
    ) {
        if options.skip_ads {
            return;
        }
        if self.job_store.start_stage(job_id, Stage::Ads).is_err() {
            return;
        }
        let adapter = AdAdapter::new(
            self.image_synthesizer.clone(),
            self.config.retry,
            Duration::from_millis(self.config.stage_timeouts.image_synthesis_millis),
            self.config.intra_branch_concurrency,
        );
        match cancellable(cancellation, adapter.run(analysis, options)).await {
            None => {
                let _ = self.job_store.finish_stage_failure(job_id, Stage::Ads);
            }
            Some(results) => {
                let ads: std::collections::HashMap<String, serde_json::Value> = results
                    .into_iter()
                    .filter_map(|(platform, r)| match r {
                        Ok(value) => Some((platform, value)),
                        Err(e) => {
                            warn!(job_id = %job_id, platform = %platform, error = %e, "ad platform failed");
                            None
                        }
                    })
                    .collect();
                if ads.is_empty() {
                    let _ = self.job_store.finish_stage_failure(job_id, Stage::Ads);
                } else {
                    let _ = self.job_store.finish_stage_success(job_id, Stage::Ads, |r| r.ads = Some(ads));
                }
            }
        }
    }

    async fn run_texts_branch(
        &self,
        job_id: &str,
        analysis: &crate::port::capabilities::analyzer::AnalysisRecord,
        options: &SubmitOptions,
        cancellation: &CancellationToken,
    ) {
        if options.skip_texts {
            return;
        }
        if self.job_store.start_stage(job_id, Stage::Texts).is_err() {
            return;
        }
        let adapter = TextAdapter::new(
            self.text_synthesizer.clone(),
            self.config.retry,
            Duration::from_millis(self.config.stage_timeouts.texts_millis),
        );
        let ctx = TextContext {
            analysis: analysis.clone(),
            brand_name: options.brand_name.clone(),
            product_name: options.product_name.clone(),
            tone: "friendly".to_string(),
            language: "en".to_string(),
        };
        match cancellable(cancellation, adapter.run(&ctx)).await {
            None | Some(Err(_)) => {
                let _ = self.job_store.finish_stage_failure(job_id, Stage::Texts);
            }
            Some(Ok(value)) => {
                let _ = self
                    .job_store
                    .finish_stage_success(job_id, Stage::Texts, |r| r.texts = Some(value));
            }
        }
    }
}

/// Closed-form estimate used by `Orchestrator::submit`.
pub fn estimate_seconds(options: &SubmitOptions) -> u64 {
    let mut total = 10u64;
    if !options.skip_packages {
        total += options.package_variations as u64 * 15;
    }
    if !options.skip_ads {
        let platform_count = if options.ad_platforms.is_empty() {
            crate::domain::DEFAULT_AD_PLATFORMS.len()
        } else {
            options.ad_platforms.len()
        };
        total += platform_count as u64 * 10;
    }
    if !options.skip_texts {
        total += 10;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::capabilities::analyzer::mocks::FakeAnalyzer;
    use crate::port::capabilities::image_synthesizer::mocks::FakeImageSynthesizer;
    use crate::port::capabilities::text_synthesizer::mocks::FakeTextSynthesizer;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::domain::JobState;

    fn executor_with(
        job_store: Arc<JobStore>,
        analyzer: Arc<dyn Analyzer>,
        image_synthesizer: Arc<dyn ImageSynthesizer>,
        text_synthesizer: Arc<dyn TextSynthesizer>,
    ) -> PipelineExecutor {
        let mut config = OrchestratorConfig::default();
        config.retry.initial_backoff_ms = 1;
        PipelineExecutor::new(job_store, analyzer, image_synthesizer, text_synthesizer, config)
    }

    fn new_store() -> Arc<JobStore> {
        Arc::new(JobStore::new(
            Arc::new(FixedTimeProvider::starting_at(1000)),
            Arc::new(SequentialIdProvider::new("job")),
        ))
    }

    #[tokio::test]
    async fn happy_path_reaches_completed_with_all_stages_done() {
        let store = new_store();
        let job = store.create(SubmitOptions::default());
        let executor = executor_with(
            store.clone(),
            Arc::new(FakeAnalyzer::succeeding(FakeAnalyzer::default_record())),
            Arc::new(FakeImageSynthesizer::succeeding()),
            Arc::new(FakeTextSynthesizer::succeeding()),
        );

        executor.run(job.id.clone(), vec![0xFF, 0xD8], CancellationToken::new()).await;

        let finished = store.get(&job.id).unwrap();
        assert_eq!(finished.state, JobState::Completed);
        assert_eq!(finished.progress.analysis, crate::domain::StageStatus::Done);
        assert_eq!(finished.progress.packages, crate::domain::StageStatus::Done);
        assert_eq!(finished.progress.ads, crate::domain::StageStatus::Done);
        assert_eq!(finished.progress.texts, crate::domain::StageStatus::Done);
        assert!(finished.result.unwrap().download_url.is_some());
    }

    #[tokio::test]
    async fn analysis_failure_fails_the_whole_job_and_skips_other_stages() {
        let store = new_store();
        let job = store.create(SubmitOptions::default());
        let executor = executor_with(
            store.clone(),
            Arc::new(FakeAnalyzer::failing(crate::port::CapabilityError::Fatal(
                "no product detected".into(),
            ))),
            Arc::new(FakeImageSynthesizer::succeeding()),
            Arc::new(FakeTextSynthesizer::succeeding()),
        );

        executor.run(job.id.clone(), vec![0xFF, 0xD8], CancellationToken::new()).await;

        let finished = store.get(&job.id).unwrap();
        assert_eq!(finished.state, JobState::Failed);
        assert_eq!(finished.progress.analysis, crate::domain::StageStatus::Failed);
        assert_eq!(finished.progress.packages, crate::domain::StageStatus::Pending);
    }

    #[tokio::test]
    async fn post_analysis_failures_are_best_effort_job_still_completes() {
        let store = new_store();
        let job = store.create(SubmitOptions::default());
        let executor = executor_with(
            store.clone(),
            Arc::new(FakeAnalyzer::succeeding(FakeAnalyzer::default_record())),
            Arc::new(FakeImageSynthesizer::new(
                crate::port::capabilities::image_synthesizer::mocks::MockBehavior::Fail(
                    crate::port::CapabilityError::Fatal("synthesis down".into()),
                ),
            )),
            Arc::new(FakeTextSynthesizer::new(
                crate::port::capabilities::text_synthesizer::mocks::MockBehavior::Fail(
                    crate::port::CapabilityError::Fatal("text service down".into()),
                ),
            )),
        );

        executor.run(job.id.clone(), vec![0xFF, 0xD8], CancellationToken::new()).await;

        let finished = store.get(&job.id).unwrap();
        assert_eq!(finished.state, JobState::Completed);
        assert_eq!(finished.progress.packages, crate::domain::StageStatus::Failed);
        assert_eq!(finished.progress.ads, crate::domain::StageStatus::Failed);
        assert_eq!(finished.progress.texts, crate::domain::StageStatus::Failed);
        let result = finished.result.unwrap();
        assert!(result.packages.is_none());
        assert!(result.ads.is_none());
        assert!(result.texts.is_none());
        assert!(finished.error.is_none());
    }

    #[tokio::test]
    async fn skipped_stages_are_never_invoked() {
        let store = new_store();
        let options = SubmitOptions {
            skip_packages: true,
            skip_ads: true,
            ..SubmitOptions::default()
        };
        let job = store.create(options);
        let image_synth = Arc::new(FakeImageSynthesizer::succeeding());
        let executor = executor_with(
            store.clone(),
            Arc::new(FakeAnalyzer::succeeding(FakeAnalyzer::default_record())),
            image_synth.clone(),
            Arc::new(FakeTextSynthesizer::succeeding()),
        );

        executor.run(job.id.clone(), vec![0xFF, 0xD8], CancellationToken::new()).await;

        assert_eq!(image_synth.call_count(), 0);
        let finished = store.get(&job.id).unwrap();
        assert_eq!(finished.progress.packages, crate::domain::StageStatus::Skipped);
        assert_eq!(finished.progress.ads, crate::domain::StageStatus::Skipped);
        assert_eq!(finished.state, JobState::Completed);
    }

    #[tokio::test]
    async fn cancellation_before_analysis_finishes_fails_the_job() {
        let store = new_store();
        let job = store.create(SubmitOptions::default());
        let executor = executor_with(
            store.clone(),
            Arc::new(FakeAnalyzer::new(
                crate::port::capabilities::analyzer::mocks::MockBehavior::Timeout(Duration::from_secs(5)),
            )),
            Arc::new(FakeImageSynthesizer::succeeding()),
            Arc::new(FakeTextSynthesizer::succeeding()),
        );
        let cancellation = CancellationToken::new();
        let cancel_clone = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel_clone.cancel();
        });

        executor.run(job.id.clone(), vec![0xFF, 0xD8], cancellation).await;

        let finished = store.get(&job.id).unwrap();
        assert_eq!(finished.state, JobState::Failed);
    }

    #[test]
    fn estimate_seconds_matches_the_closed_form() {
        let options = SubmitOptions::default();
        // 10 base + 3*15 packages + 4*10 ads + 10 texts = 95
        assert_eq!(estimate_seconds(&options), 95);

        let minimal = SubmitOptions {
            skip_packages: true,
            skip_ads: true,
            skip_texts: true,
            ..SubmitOptions::default()
        };
        assert_eq!(estimate_seconds(&minimal), 10);
    }
}
