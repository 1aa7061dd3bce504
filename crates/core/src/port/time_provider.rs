// Time Provider Port (for testability)

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub mod mocks {
    use super::TimeProvider;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Deterministic clock that advances by a fixed step on every read.
    pub struct FixedTimeProvider {
        current: AtomicI64,
        step_millis: i64,
    }

    impl FixedTimeProvider {
        pub fn starting_at(millis: i64) -> Self {
            Self {
                current: AtomicI64::new(millis),
                step_millis: 0,
            }
        }

        pub fn stepping_by(millis: i64, step_millis: i64) -> Self {
            Self {
                current: AtomicI64::new(millis),
                step_millis,
            }
        }
    }

    impl TimeProvider for FixedTimeProvider {
        fn now_millis(&self) -> i64 {
            self.current.fetch_add(self.step_millis, Ordering::SeqCst)
        }
    }
}
