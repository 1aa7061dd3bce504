//! Admission control: an atomic active-job counter with a CAS-loop
//! admission check — a synchronous go/no-go decision, not a waiting room.
//!
//! The same CAS-loop discipline a token-bucket rate limiter uses, generalized
//! from a refill-rate bucket to a fixed-ceiling counter. Admission returns a
//! `JobPermit` whose `Drop` releases the slot, so a job
//! that ends (by any path — complete, fail, or an early `return`) can never
//! leak capacity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::domain::DomainError;

pub struct Scheduler {
    active: Arc<AtomicUsize>,
    max_concurrent_jobs: usize,
}

/// RAII admission guard. Decrements the active count when dropped, regardless
/// of how the job's task exits.
pub struct JobPermit {
    active: Arc<AtomicUsize>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Scheduler {
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            max_concurrent_jobs,
        }
    }

    /// atomically checks `activeCount < max`; admits (incrementing the
    /// count) or rejects with `CapacityExhausted` before any job record exists.
    pub fn try_admit(&self) -> Result<JobPermit, DomainError> {
        loop {
            let current = self.active.load(Ordering::Acquire);
            if current >= self.max_concurrent_jobs {
                return Err(DomainError::CapacityExhausted {
                    current,
                    max: self.max_concurrent_jobs,
                });
            }
            if self
                .active
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(JobPermit {
                    active: self.active.clone(),
                });
            }
            // Lost the race to a concurrent Submit; retry the whole check.
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }
}
