//! Reference counting and teardown signalling shared by session handles
//!
//! A [`SessionEnvelope`] counts outstanding references independently of the
//! registry lock. Once teardown has been requested, the release that takes
//! the count to zero wakes whoever is waiting in
//! [`wait_for_drain`](SessionEnvelope::wait_for_drain).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{error, warn};

/// Reference count plus drain notification for a session
#[derive(Debug, Default)]
pub struct SessionEnvelope {
    ref_count: AtomicUsize,
    teardown_requested: AtomicBool,
    drained: Notify,
}

impl SessionEnvelope {
    /// Create an envelope with no references
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of references currently held
    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::SeqCst)
    }

    /// Whether a teardown is waiting for the count to drain
    pub fn is_teardown_requested(&self) -> bool {
        self.teardown_requested.load(Ordering::SeqCst)
    }

    /// Take a reference, returning the new count
    ///
    /// Callers must hold the registry lock and have confirmed the session is
    /// still registered.
    pub(crate) fn acquire(&self) -> usize {
        self.ref_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drop a reference, returning the remaining count
    pub(crate) fn release(&self) -> usize {
        match self
            .ref_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(previous) => {
                let remaining = previous - 1;
                if remaining == 0 && self.is_teardown_requested() {
                    self.drained.notify_waiters();
                }
                remaining
            }
            Err(_) => {
                error!("Session reference released more times than it was acquired");
                0
            }
        }
    }

    /// Mark the session as being torn down
    pub(crate) fn request_teardown(&self) {
        self.teardown_requested.store(true, Ordering::SeqCst);
    }

    /// Wait until every outstanding reference has been released
    ///
    /// The wait cannot be abandoned part way; a warning is logged every
    /// `warn_interval` while references remain. A zero interval disables the
    /// warnings.
    pub(crate) async fn wait_for_drain(&self, warn_interval: Duration) {
        let started = Instant::now();

        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();

            if self.ref_count() == 0 {
                return;
            }

            if warn_interval.is_zero() {
                notified.await;
            } else if tokio::time::timeout(warn_interval, notified.as_mut())
                .await
                .is_err()
            {
                warn!(
                    outstanding = self.ref_count(),
                    elapsed = ?started.elapsed(),
                    "Still waiting for session references to drain"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    // ==================== Counting Tests ====================

    #[test]
    fn new_envelope_has_no_references() {
        let envelope = SessionEnvelope::new();
        assert_eq!(envelope.ref_count(), 0);
        assert!(!envelope.is_teardown_requested());
    }

    #[test]
    fn acquire_and_release_track_count() {
        let envelope = SessionEnvelope::new();

        assert_eq!(envelope.acquire(), 1);
        assert_eq!(envelope.acquire(), 2);
        assert_eq!(envelope.release(), 1);
        assert_eq!(envelope.release(), 0);
    }

    #[test]
    fn release_never_goes_negative() {
        let envelope = SessionEnvelope::new();

        assert_eq!(envelope.release(), 0);
        assert_eq!(envelope.ref_count(), 0);
    }

    // ==================== Drain Tests ====================

    #[tokio::test]
    async fn drain_returns_immediately_when_idle() {
        let envelope = SessionEnvelope::new();
        envelope.request_teardown();

        envelope.wait_for_drain(Duration::from_secs(1)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn drain_waits_for_last_release() {
        let envelope = Arc::new(SessionEnvelope::new());
        envelope.acquire();
        envelope.acquire();
        envelope.request_teardown();

        let drainer = {
            let envelope = Arc::clone(&envelope);
            tokio::spawn(async move { envelope.wait_for_drain(Duration::ZERO).await })
        };

        envelope.release();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!drainer.is_finished());

        envelope.release();
        tokio::time::timeout(Duration::from_secs(5), drainer)
            .await
            .expect("drain should complete")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn drain_keeps_waiting_past_warn_interval() {
        let envelope = Arc::new(SessionEnvelope::new());
        envelope.acquire();
        envelope.request_teardown();

        let drainer = {
            let envelope = Arc::clone(&envelope);
            tokio::spawn(async move { envelope.wait_for_drain(Duration::from_millis(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!drainer.is_finished());

        envelope.release();
        tokio::time::timeout(Duration::from_secs(5), drainer)
            .await
            .expect("drain should complete")
            .unwrap();
    }
}
