// Job domain model: the in-flight or terminal unit of work produced by Submit.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::error::{DomainError, Result};

/// Opaque job identifier (random 128-bit, rendered as a UUID string).
pub type JobId = String;

/// Top-level job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "PENDING"),
            JobState::Processing => write!(f, "PROCESSING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

/// One of the four units of progress inside the stage DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Analysis,
    Packages,
    Ads,
    Texts,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Analysis, Stage::Packages, Stage::Ads, Stage::Texts];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Analysis => write!(f, "ANALYSIS"),
            Stage::Packages => write!(f, "PACKAGES"),
            Stage::Ads => write!(f, "ADS"),
            Stage::Texts => write!(f, "TEXTS"),
        }
    }
}

/// Per-stage status. `Skipped` is set once at creation and never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Pending,
    Processing,
    Done,
    Failed,
    Skipped,
}

/// The frozen copy of submission options a job carries for its whole lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOptions {
    pub brand_name: Option<String>,
    pub product_name: Option<String>,
    pub package_variations: u32,
    pub ad_platforms: Vec<String>,
    pub skip_packages: bool,
    pub skip_ads: bool,
    pub skip_texts: bool,
}

/// Default ad-platform fan-out when the caller does not name any.
pub const DEFAULT_AD_PLATFORMS: [&str; 4] = [
    "instagram-square",
    "twitter-card",
    "facebook-feed",
    "web-banner-medium-rectangle",
];

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            brand_name: None,
            product_name: None,
            package_variations: 3,
            ad_platforms: DEFAULT_AD_PLATFORMS.iter().map(|s| s.to_string()).collect(),
            skip_packages: false,
            skip_ads: false,
            skip_texts: false,
        }
    }
}

/// Progress map: one status per stage, always populated (never a sparse map).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressMap {
    pub analysis: StageStatus,
    pub packages: StageStatus,
    pub ads: StageStatus,
    pub texts: StageStatus,
}

impl ProgressMap {
    fn initial(options: &SubmitOptions) -> Self {
        Self {
            analysis: StageStatus::Pending,
            packages: if options.skip_packages {
                StageStatus::Skipped
            } else {
                StageStatus::Pending
            },
            ads: if options.skip_ads {
                StageStatus::Skipped
            } else {
                StageStatus::Pending
            },
            texts: if options.skip_texts {
                StageStatus::Skipped
            } else {
                StageStatus::Pending
            },
        }
    }

    pub fn get(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Analysis => self.analysis,
            Stage::Packages => self.packages,
            Stage::Ads => self.ads,
            Stage::Texts => self.texts,
        }
    }

    fn set(&mut self, stage: Stage, status: StageStatus) {
        match stage {
            Stage::Analysis => self.analysis = status,
            Stage::Packages => self.packages = status,
            Stage::Ads => self.ads = status,
            Stage::Texts => self.texts = status,
        }
    }

    /// True once every non-skipped stage has reached a terminal status.
    pub fn all_branches_terminal(&self) -> bool {
        Stage::ALL.iter().all(|s| {
            matches!(
                self.get(*s),
                StageStatus::Done | StageStatus::Failed | StageStatus::Skipped
            )
        })
    }
}

/// Lazily-filled bag of per-stage outputs. A field is populated only once its
/// producing stage reaches `Done`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResult {
    pub analysis: Option<serde_json::Value>,
    pub packages: Option<Vec<serde_json::Value>>,
    pub ads: Option<HashMap<String, serde_json::Value>>,
    pub texts: Option<serde_json::Value>,
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub progress: ProgressMap,
    pub options: SubmitOptions,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
    pub error: Option<String>,
    pub result: Option<JobResult>,
}

impl Job {
    pub fn new(id: impl Into<String>, now_millis: i64, options: SubmitOptions) -> Self {
        let progress = ProgressMap::initial(&options);
        Self {
            id: id.into(),
            state: JobState::Pending,
            progress,
            options,
            created_at: now_millis,
            updated_at: now_millis,
            completed_at: None,
            error: None,
            result: None,
        }
    }

    /// Pending -> Processing, when the executor picks the job up.
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Pending {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Processing.to_string(),
            });
        }
        self.state = JobState::Processing;
        self.updated_at = now_millis;
        Ok(())
    }

    /// Processing -> Completed. The "at least one required output stage is Done"
    /// check is enforced by the pipeline executor before calling this, not here.
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        if self.state == JobState::Completed || self.state == JobState::Failed {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Completed.to_string(),
            });
        }
        self.state = JobState::Completed;
        self.updated_at = now_millis;
        self.completed_at = Some(now_millis);
        Ok(())
    }

    /// -> Failed (from Pending, before Analysis starts, on cancellation; or from
    /// Processing, on analysis failure or later-stage cancellation). Idempotent in
    /// the sense that a job already Failed or Completed never transitions away.
    pub fn fail(&mut self, now_millis: i64, reason: impl Into<String>) -> Result<()> {
        if self.state == JobState::Completed || self.state == JobState::Failed {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Failed.to_string(),
            });
        }
        self.state = JobState::Failed;
        self.error = Some(reason.into());
        self.updated_at = now_millis;
        self.completed_at = Some(now_millis);
        Ok(())
    }

    /// Update one stage's status. Refuses to overwrite a `Skipped` stage.
    pub fn update_stage(&mut self, now_millis: i64, stage: Stage, status: StageStatus) -> Result<()> {
        if self.progress.get(stage) == StageStatus::Skipped {
            return Err(DomainError::InvalidStateTransition {
                from: "SKIPPED".to_string(),
                to: format!("{:?}", status).to_uppercase(),
            });
        }
        self.progress.set(stage, status);
        self.updated_at = now_millis;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, JobState::Completed | JobState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with(options: SubmitOptions) -> Job {
        Job::new("job-1", 1000, options)
    }

    #[test]
    fn new_job_is_pending_with_initial_progress() {
        let job = job_with(SubmitOptions::default());
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.progress.analysis, StageStatus::Pending);
        assert_eq!(job.progress.packages, StageStatus::Pending);
        assert!(job.started_at_is_unset());
    }

    impl Job {
        fn started_at_is_unset(&self) -> bool {
            self.completed_at.is_none()
        }
    }

    #[test]
    fn skipped_stages_are_set_at_creation_and_never_revisited() {
        let mut options = SubmitOptions::default();
        options.skip_packages = true;
        options.skip_ads = true;
        let mut job = job_with(options);
        assert_eq!(job.progress.packages, StageStatus::Skipped);
        assert_eq!(job.progress.ads, StageStatus::Skipped);

        let err = job
            .update_stage(2000, Stage::Packages, StageStatus::Processing)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(job.progress.packages, StageStatus::Skipped);
    }

    #[test]
    fn lifecycle_pending_processing_completed() {
        let mut job = job_with(SubmitOptions::default());
        job.start(2000).unwrap();
        assert_eq!(job.state, JobState::Processing);
        job.complete(3000).unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.completed_at, Some(3000));
        assert_eq!(job.updated_at, 3000);
    }

    #[test]
    fn terminal_state_never_transitions_away() {
        let mut job = job_with(SubmitOptions::default());
        job.start(2000).unwrap();
        job.complete(3000).unwrap();
        assert!(job.fail(4000, "too late").is_err());
        assert_eq!(job.state, JobState::Completed);
    }

    #[test]
    fn job_serializes_and_round_trips() {
        let job = job_with(SubmitOptions::default());
        let json = serde_json::to_string(&job).expect("serialize");
        let back: Job = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(job.id, back.id);
        assert_eq!(job.state, back.state);
    }
}
