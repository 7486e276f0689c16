//! Recording [`Notifier`] with scripted failures.

use eventbooker_core::notify::{NotifyError, Notifier};
use eventbooker_core::types::ChatId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// One call to [`Notifier::send_text`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendAttempt {
    /// Destination chat
    pub chat_id: ChatId,
    /// Message text
    pub text: String,
    /// When the call started
    pub at: Instant,
    /// Whether the call succeeded
    pub delivered: bool,
}

#[derive(Debug, Default)]
struct Inner {
    attempts: Mutex<Vec<SendAttempt>>,
    fail_remaining: AtomicUsize,
    fail_always: AtomicBool,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Notifier that records every call.
///
/// Clones share their record, so a test can keep one clone and hand another to the
/// dispatcher.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    inner: Arc<Inner>,
}

impl RecordingNotifier {
    /// Create a notifier whose calls succeed immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier whose calls take `latency`.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                latency,
                ..Inner::default()
            }),
        }
    }

    /// Fail the next `count` calls.
    pub fn fail_next(&self, count: usize) {
        self.inner.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Fail every call while `fail` is set.
    pub fn fail_always(&self, fail: bool) {
        self.inner.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn attempts(&self) -> Vec<SendAttempt> {
        self.inner
            .attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Successful calls so far, in order.
    #[must_use]
    pub fn delivered(&self) -> Vec<SendAttempt> {
        self.attempts().into_iter().filter(|a| a.delivered).collect()
    }

    /// Most calls that were ever in progress at the same time.
    #[must_use]
    pub fn max_concurrent_sends(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` calls were made. Returns `false` on timeout.
    pub async fn wait_for_attempts(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, || self.attempts().len() >= count).await
    }

    /// Wait until at least `count` calls succeeded. Returns `false` on timeout.
    pub async fn wait_for_delivered(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, || self.delivered().len() >= count).await
    }

    async fn wait_until(&self, timeout: Duration, done: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while !done() {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    fn should_fail(&self) -> bool {
        if self.inner.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        self.inner
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Notifier for RecordingNotifier {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), NotifyError> {
        let at = Instant::now();
        let in_flight = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if !self.inner.latency.is_zero() {
            tokio::time::sleep(self.inner.latency).await;
        }

        let delivered = !self.should_fail();
        self.inner
            .attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SendAttempt {
                chat_id,
                text: text.to_string(),
                at,
                delivered,
            });
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        if delivered {
            Ok(())
        } else {
            Err(NotifyError::Unavailable("scripted failure".to_string()))
        }
    }
}
