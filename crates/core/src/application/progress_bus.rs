//! Progress Bus: per-job fan-out of state-change events.
//!
//! `SubscriberRegistry` holds the fan-out mechanics (replay, per-subscriber
//! serialized delivery, unsubscribe-then-drain) for one job. It does not own
//! a lock itself — `JobStore` holds the per-job lock and calls into this
//! registry from inside the same critical section it mutates the job under,
//! which is what makes per-job total ordering hold: every `publish` call is
//! serialized with every job mutation for that id.
//!
//! Delivery to each subscriber is via a dedicated `mpsc::UnboundedSender`
//! drained by one single-threaded task per subscriber — a single task reading
//! an unbounded queue is naturally serialized, which gives "at-most-one-
//! in-flight callback per subscriber" for free. A panicking callback is caught
//! and logged (`panic_guard`-style isolation), never propagated to the
//! publisher.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::{Job, JobId, JobResult, JobState, ProgressMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressEventKind {
    Progress,
    Complete,
    Error,
}

/// Carries {jobId, event-kind, current full progress map, optional result
/// snapshot, optional error message}. Reflects post-transition state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub kind: ProgressEventKind,
    pub progress: ProgressMap,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn from_job(job: &Job) -> Self {
        let kind = match job.state {
            JobState::Completed => ProgressEventKind::Complete,
            JobState::Failed => ProgressEventKind::Error,
            JobState::Pending | JobState::Processing => ProgressEventKind::Progress,
        };
        Self {
            job_id: job.id.clone(),
            kind,
            progress: job.progress.clone(),
            result: job.result.clone(),
            error: job.error.clone(),
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Delivers one event directly, bypassing the per-subscriber queue. Used only
/// for the synchronous replay call a new subscriber gets before `subscribe`
/// returns — every later event goes through the queued path instead.
pub fn deliver_replay(callback: &ProgressCallback, event: ProgressEvent) {
    invoke_guarded(callback, event);
}

fn invoke_guarded(callback: &ProgressCallback, event: ProgressEvent) {
    let callback = callback.clone();
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| (callback)(event)));
    if let Err(panic) = outcome {
        let message = if let Some(s) = panic.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        warn!(panic_message = %message, "progress subscriber callback panicked; discarding");
    }
}

struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

/// Per-job subscriber bookkeeping. Lives inside the job's own entry lock.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl SubscriberRegistry {
    /// Registers a new subscriber and spawns its dedicated drain task. Does
    /// NOT perform the replay call — the caller (`JobStore::subscribe`) does
    /// that itself, synchronously, before or after calling this, while still
    /// holding the entry lock.
    pub fn register(&mut self, callback: ProgressCallback) -> (u64, JoinHandle<()>) {
        let id = self.next_id;
        self.next_id += 1;
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
        self.subscribers.push(Subscriber { id, sender: tx });
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                invoke_guarded(&callback, event);
            }
        });
        (id, handle)
    }

    /// Publishes one event to every live subscriber. Must be called from
    /// inside the same critical section as the mutation it reports.
    pub fn publish(&self, event: &ProgressEvent) {
        for subscriber in &self.subscribers {
            // Unbounded send never blocks; a slow subscriber only backs up its
            // own queue, never the producer or other subscribers.
            let _ = subscriber.sender.send(event.clone());
        }
    }

    /// Removes the subscriber so no further events are queued to it. The
    /// caller is responsible for awaiting the returned drain task's
    /// `JoinHandle` (outside the entry lock) before telling its own caller
    /// that unsubscribe is complete.
    pub fn remove(&mut self, id: u64) {
        self.subscribers.retain(|s| s.id != id);
    }

    /// Tears down every subscriber (used by `JobStore::delete`). Drops every
    /// sender, which causes each drain task to observe channel closure and
    /// exit on its own; callers do not wait for that to happen.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}
