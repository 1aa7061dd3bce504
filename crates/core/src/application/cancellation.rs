// Cooperative cancellation for an in-flight job.
//
// A composite deadline is `min(per-stage timeout, cancellation signal)`; no
// forceful thread interruption is assumed, callers check the token at
// suspension points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_observed_across_threads() {
        let token = CancellationToken::new();
        let for_thread = token.clone();
        let handle = std::thread::spawn(move || {
            for_thread.cancel();
        });
        handle.join().unwrap();
        assert!(token.is_cancelled());
    }
}
