//! TTL Reaper: a single background ticker that sweeps terminal jobs
//! older than their TTL out of the Job Store.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info};

use super::job_store::JobStore;
use crate::port::TimeProvider;

pub struct TtlReaper {
    store: Arc<JobStore>,
    time: Arc<dyn TimeProvider>,
    interval: Duration,
    ttl: Duration,
}

impl TtlReaper {
    pub fn new(store: Arc<JobStore>, time: Arc<dyn TimeProvider>, interval: Duration, ttl: Duration) -> Self {
        Self {
            store,
            time,
            interval,
            ttl,
        }
    }

    /// Background loop; spawn with `tokio::spawn`. A zero interval disables
    /// the reaper entirely.
    pub async fn run(self) {
        if self.interval.is_zero() {
            info!("TTL reaper disabled (cleanupIntervalSeconds=0)");
            return;
        }
        info!(interval_secs = self.interval.as_secs(), ttl_secs = self.ttl.as_secs(), "TTL reaper started");
        let mut tick = interval(self.interval);
        loop {
            tick.tick().await;
            self.run_now();
        }
    }

    /// Sweeps once, synchronously. Never touches a non-terminal job.
    pub fn run_now(&self) -> usize {
        let now = self.time.now_millis();
        let ttl_millis = self.ttl.as_millis() as i64;
        let mut reaped = 0;
        for job in self.store.list() {
            if !job.is_terminal() {
                continue;
            }
            if now - job.created_at > ttl_millis {
                self.store.delete(&job.id);
                reaped += 1;
                debug!(job_id = %job.id, age_ms = now - job.created_at, "reaped expired job");
            }
        }
        if reaped > 0 {
            info!(count = reaped, "TTL reaper swept expired jobs");
        }
        reaped
    }
}
