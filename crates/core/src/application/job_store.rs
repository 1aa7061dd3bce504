//! Job Store: the single authority for job records. All reads return
//! point-in-time snapshot copies; all writes are atomic read-modify-write
//! operations guarded by a per-job lock, each emitting exactly one
//! `ProgressEvent` from inside that same critical section.
//!
//! Locking follows shared-resource policy: a coarse `parking_lot::Mutex`
//! over the job map for structural ops (create/delete/list), and a per-entry
//! `parking_lot::Mutex` for in-record mutation and subscriber bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{DomainError, Job, JobId, JobResult, JobState, Stage, StageStatus, SubmitOptions};
use crate::port::{IdProvider, TimeProvider};

use super::progress_bus::{ProgressCallback, ProgressEvent, SubscriberRegistry};

struct JobEntry {
    job: Job,
    subscribers: SubscriberRegistry,
}

pub struct JobStore {
    entries: Mutex<HashMap<JobId, Arc<Mutex<JobEntry>>>>,
    time: Arc<dyn TimeProvider>,
    ids: Arc<dyn IdProvider>,
}

/// A live subscription to one job's progress. Dropping this without calling
/// `unsubscribe` leaves the drain task running — call `unsubscribe` to tear
/// it down deterministically.
pub struct Subscription {
    entry: Arc<Mutex<JobEntry>>,
    id: u64,
    drain_handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Guarantees that no further callbacks begin after this returns; a
    /// callback already running may finish.
    pub async fn unsubscribe(mut self) {
        {
            let mut entry = self.entry.lock();
            entry.subscribers.remove(self.id);
        }
        if let Some(handle) = self.drain_handle.take() {
            let _ = handle.await;
        }
    }
}

impl JobStore {
    pub fn new(time: Arc<dyn TimeProvider>, ids: Arc<dyn IdProvider>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            time,
            ids,
        }
    }

    fn entry_for(&self, id: &str) -> Option<Arc<Mutex<JobEntry>>> {
        self.entries.lock().get(id).cloned()
    }

    /// `Create`: materializes a new job in `Pending`, assigns id/timestamps.
    pub fn create(&self, options: SubmitOptions) -> Job {
        let id = self.ids.generate_id();
        let now = self.time.now_millis();
        let job = Job::new(id.clone(), now, options);
        let entry = Arc::new(Mutex::new(JobEntry {
            job: job.clone(),
            subscribers: SubscriberRegistry::default(),
        }));
        self.entries.lock().insert(id, entry);
        job
    }

    /// `Get`: snapshot copy, never a reference into the store.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.entry_for(id).map(|entry| entry.lock().job.clone())
    }

    /// `List`: snapshot of all current records, ordering unspecified.
    pub fn list(&self) -> Vec<Job> {
        self.entries
            .lock()
            .values()
            .map(|entry| entry.lock().job.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn mutate<F>(&self, id: &str, mutate: F) -> Result<ProgressEvent, DomainError>
    where
        F: FnOnce(&mut Job, i64) -> Result<(), DomainError>,
    {
        let entry = self
            .entry_for(id)
            .ok_or_else(|| DomainError::JobNotFound(id.to_string()))?;
        let now = self.time.now_millis();
        let mut guard = entry.lock();
        mutate(&mut guard.job, now)?;
        let event = ProgressEvent::from_job(&guard.job);
        guard.subscribers.publish(&event);
        Ok(event)
    }

    /// Pending -> Processing, when the executor picks the job up.
    pub fn start(&self, id: &str) -> Result<(), DomainError> {
        self.mutate(id, |job, now| job.start(now))?;
        Ok(())
    }

    /// Marks one stage `Processing`.
    pub fn start_stage(&self, id: &str, stage: Stage) -> Result<(), DomainError> {
        self.mutate(id, |job, now| job.update_stage(now, stage, StageStatus::Processing))?;
        Ok(())
    }

    /// Marks one stage `Done` and merges its output into the job's Result in
    /// the same critical section: the field appears no earlier than the
    /// stage reaching `Done`, and no later either — both happen atomically.
    pub fn finish_stage_success<F>(&self, id: &str, stage: Stage, merge: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut JobResult),
    {
        self.mutate(id, |job, now| {
            let result = job.result.get_or_insert_with(JobResult::default);
            merge(result);
            job.update_stage(now, stage, StageStatus::Done)
        })?;
        Ok(())
    }

    /// Marks one stage `Failed`. Post-analysis stage failures never touch the
    /// job-level `error` field.
    pub fn finish_stage_failure(&self, id: &str, stage: Stage) -> Result<(), DomainError> {
        self.mutate(id, |job, now| job.update_stage(now, stage, StageStatus::Failed))?;
        Ok(())
    }

    /// Processing -> Completed. Computes `downloadUrl` at this point,
    /// since it is only meaningful once the job has a stable terminal Result.
    pub fn complete(&self, id: &str) -> Result<(), DomainError> {
        self.mutate(id, |job, now| {
            job.complete(now)?;
            let result = job.result.get_or_insert_with(JobResult::default);
            result.download_url = Some(format!("/jobs/{}/bundle", job.id));
            Ok(())
        })?;
        debug!(job_id = %id, "job completed");
        Ok(())
    }

    /// -> Failed, with a single top-level reason (analysis failure or
    /// cancellation before/while the job was in flight).
    pub fn fail(&self, id: &str, reason: impl Into<String>) -> Result<(), DomainError> {
        let reason = reason.into();
        self.mutate(id, |job, now| job.fail(now, reason.clone()))?;
        Ok(())
    }

    /// `Delete`: removes the record and tears down its subscriber set.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.entries.lock().remove(id);
        match removed {
            Some(entry) => {
                entry.lock().subscribers.clear();
                true
            }
            None => false,
        }
    }

    /// `subscribe`: synchronously delivers a replay event reflecting the
    /// job's current state before returning, then registers the subscriber
    /// for every subsequent event. Returns `None` if the job does not exist.
    pub fn subscribe(&self, id: &str, callback: ProgressCallback) -> Option<Subscription> {
        let entry = self.entry_for(id)?;
        let mut guard = entry.lock();
        let replay = ProgressEvent::from_job(&guard.job);
        let (sub_id, handle) = guard.subscribers.register(callback.clone());
        drop(guard);
        super::progress_bus::deliver_replay(&callback, replay);
        Some(Subscription {
            entry,
            id: sub_id,
            drain_handle: Some(handle),
        })
    }

    pub fn is_terminal(&self, id: &str) -> Option<bool> {
        self.get(id).map(|job| job.state == JobState::Completed || job.state == JobState::Failed)
    }
}
