//! # EventBooker Testing
//!
//! Test doubles for the EventBooker collaborators.
//!
//! This crate provides:
//! - [`InMemoryBookingStore`]: a transactional in-memory store with fault injection
//! - [`RecordingNotifier`]: a notifier that records calls and fails on demand
//! - [`FixedClock`] and [`ManualClock`]: deterministic time
//! - [`properties`]: proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use eventbooker_testing::{InMemoryBookingStore, test_clock};
//! use eventbooker_runtime::ReservationWorkflow;
//!
//! #[tokio::test]
//! async fn books_a_seat() {
//!     let store = Arc::new(InMemoryBookingStore::new());
//!     let workflow = ReservationWorkflow::new(Arc::clone(&store), Arc::new(test_clock()));
//!
//!     let reservation = workflow.book(user_id, event_id).await.unwrap();
//!     assert_eq!(store.reservation(reservation.id).await, Some(reservation));
//! }
//! ```

use chrono::{DateTime, Utc};
use eventbooker_core::environment::Clock;

pub mod notifier;
pub mod store;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use eventbooker_testing::mocks::FixedClock;
    /// use eventbooker_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can advance the clock handed to a sweeper.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward by `by`.
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use eventbooker_core::types::ReservationStatus;
    use proptest::prelude::*;

    /// Any reservation status.
    pub fn reservation_status() -> impl Strategy<Value = ReservationStatus> {
        prop_oneof![
            Just(ReservationStatus::Pending),
            Just(ReservationStatus::Confirmed),
            Just(ReservationStatus::Cancelled),
        ]
    }

    /// A sequence of confirm/cancel requests, `true` meaning confirm.
    pub fn transition_requests(max_len: usize) -> impl Strategy<Value = Vec<bool>> {
        proptest::collection::vec(any::<bool>(), 0..max_len)
    }
}

/// Install a `tracing` subscriber writing to the test output.
///
/// Honors `RUST_LOG`. Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock, test_epoch};
pub use notifier::{RecordingNotifier, SendAttempt};
pub use store::{DeleteGate, InMemoryBookingStore, InMemoryTransaction};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn manual_clock_clones_move_together() {
        let clock = ManualClock::new(test_epoch());
        let handle = clock.clone();

        handle.advance(chrono::Duration::minutes(2));
        assert_eq!(clock.now(), test_epoch() + chrono::Duration::minutes(2));
    }
}
