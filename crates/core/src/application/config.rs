//! Orchestrator configuration: one struct holding every runtime
//! knob, with compiled-in defaults overlaid by `GENORCH_*` environment
//! variables at construction time.

use std::time::Duration;
use tracing::debug;

use super::retry::RetryPolicy;

#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub analysis_millis: u64,
    pub image_synthesis_millis: u64,
    pub texts_millis: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            analysis_millis: 30_000,
            image_synthesis_millis: 60_000,
            texts_millis: 30_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_concurrent_jobs: usize,
    pub cleanup_interval_seconds: u64,
    pub job_ttl_seconds: u64,
    pub intra_branch_concurrency: usize,
    pub stage_timeouts: StageTimeouts,
    pub retry: RetryPolicy,
    pub default_ad_platforms: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 5,
            cleanup_interval_seconds: 600,
            job_ttl_seconds: 3600,
            intra_branch_concurrency: 2,
            stage_timeouts: StageTimeouts::default(),
            retry: RetryPolicy::default(),
            default_ad_platforms: crate::domain::DEFAULT_AD_PLATFORMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl OrchestratorConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_seconds)
    }

    /// Overlays `GENORCH_*` env vars onto the defaults. Never panics: an unset
    /// or unparsable variable is logged at `debug` and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.max_concurrent_jobs =
            read_env("GENORCH_MAX_CONCURRENT_JOBS", config.max_concurrent_jobs);
        config.cleanup_interval_seconds = read_env(
            "GENORCH_CLEANUP_INTERVAL_SECONDS",
            config.cleanup_interval_seconds,
        );
        config.job_ttl_seconds = read_env("GENORCH_JOB_TTL_SECONDS", config.job_ttl_seconds);
        config.intra_branch_concurrency = read_env(
            "GENORCH_INTRA_BRANCH_CONCURRENCY",
            config.intra_branch_concurrency,
        );
        config.stage_timeouts.analysis_millis = read_env(
            "GENORCH_ANALYSIS_TIMEOUT_MILLIS",
            config.stage_timeouts.analysis_millis,
        );
        config.stage_timeouts.image_synthesis_millis = read_env(
            "GENORCH_IMAGE_SYNTHESIS_TIMEOUT_MILLIS",
            config.stage_timeouts.image_synthesis_millis,
        );
        config.stage_timeouts.texts_millis = read_env(
            "GENORCH_TEXTS_TIMEOUT_MILLIS",
            config.stage_timeouts.texts_millis,
        );
        config.retry.max_attempts = read_env("GENORCH_RETRY_MAX_ATTEMPTS", config.retry.max_attempts);
        config.retry.initial_backoff_ms = read_env(
            "GENORCH_RETRY_INITIAL_BACKOFF_MILLIS",
            config.retry.initial_backoff_ms,
        );
        config.retry.multiplier = read_env("GENORCH_RETRY_MULTIPLIER", config.retry.multiplier);
        config
    }
}

fn read_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                debug!(var = %name, raw = %raw, default = %default, "unparsable config override, using default");
                default
            }
        },
        Err(_) => default,
    }
}
