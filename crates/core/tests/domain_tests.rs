// Job state machine tests: pure domain logic, no executor involved.

use genorch_core::domain::{Job, JobState, Stage, StageStatus, SubmitOptions};

#[test]
fn job_creation_populates_progress_from_options() {
    let job = Job::new("job-1", 1_000, SubmitOptions::default());

    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.progress.analysis, StageStatus::Pending);
    assert_eq!(job.progress.packages, StageStatus::Pending);
    assert_eq!(job.progress.ads, StageStatus::Pending);
    assert_eq!(job.progress.texts, StageStatus::Pending);
    assert!(job.completed_at.is_none());
    assert!(job.error.is_none());
    assert!(job.result.is_none());
}

#[test]
fn skip_options_mark_stages_skipped_at_creation() {
    let options = SubmitOptions {
        skip_packages: true,
        skip_ads: true,
        ..SubmitOptions::default()
    };
    let job = Job::new("job-2", 0, options);

    assert_eq!(job.progress.packages, StageStatus::Skipped);
    assert_eq!(job.progress.ads, StageStatus::Skipped);
    assert_eq!(job.progress.texts, StageStatus::Pending);
}

#[test]
fn lifecycle_pending_to_processing_to_completed() {
    let mut job = Job::new("job-3", 0, SubmitOptions::default());

    job.start(10).unwrap();
    assert_eq!(job.state, JobState::Processing);

    job.complete(20).unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.completed_at, Some(20));
}

#[test]
fn terminal_states_never_transition_away() {
    let mut job = Job::new("job-4", 0, SubmitOptions::default());
    job.start(10).unwrap();
    job.complete(20).unwrap();

    assert!(job.start(30).is_err());
    assert!(job.complete(30).is_err());
    assert!(job.fail(30, "too late").is_err());
    assert_eq!(job.state, JobState::Completed);
}

#[test]
fn fail_from_pending_sets_error_and_completed_at() {
    let mut job = Job::new("job-5", 0, SubmitOptions::default());
    job.fail(15, "cancelled before pickup").unwrap();

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error.as_deref(), Some("cancelled before pickup"));
    assert_eq!(job.completed_at, Some(15));
}

#[test]
fn skipped_stage_is_never_revisited() {
    let options = SubmitOptions {
        skip_texts: true,
        ..SubmitOptions::default()
    };
    let mut job = Job::new("job-6", 0, options);

    let result = job.update_stage(10, Stage::Texts, StageStatus::Done);
    assert!(result.is_err());
    assert_eq!(job.progress.texts, StageStatus::Skipped);
}

#[test]
fn non_skipped_stage_transitions_through_processing_to_done() {
    let mut job = Job::new("job-7", 0, SubmitOptions::default());

    job.update_stage(5, Stage::Analysis, StageStatus::Processing).unwrap();
    assert_eq!(job.progress.analysis, StageStatus::Processing);

    job.update_stage(10, Stage::Analysis, StageStatus::Done).unwrap();
    assert_eq!(job.progress.analysis, StageStatus::Done);
    assert_eq!(job.updated_at, 10);
}

#[test]
fn all_branches_terminal_accounts_for_skipped_stages() {
    let options = SubmitOptions {
        skip_packages: true,
        skip_ads: true,
        ..SubmitOptions::default()
    };
    let mut job = Job::new("job-8", 0, options);
    assert!(!job.progress.all_branches_terminal());

    job.update_stage(1, Stage::Analysis, StageStatus::Done).unwrap();
    assert!(!job.progress.all_branches_terminal());

    job.update_stage(2, Stage::Texts, StageStatus::Done).unwrap();
    assert!(job.progress.all_branches_terminal());
}
