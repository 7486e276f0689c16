//! # EventBooker Core
//!
//! Domain types, rules and collaborator traits for the EventBooker booking engine.
//!
//! The engine sells a fixed number of seats per event. A reservation either takes a seat
//! immediately or holds it for a limited time until the user confirms; lapsed holds are swept
//! and their owners notified.
//!
//! ## Layout
//!
//! - [`types`]: events, reservations, identifiers and statuses
//! - [`capacity`]: the pure admission rule deciding whether a seat can be taken
//! - [`store`]: the storage collaborator and its transactional unit of work
//! - [`notify`]: the messaging transport collaborator and in-flight messages
//! - [`pagination`]: keyset page requests
//! - [`environment`]: injected time
//!
//! Everything that performs I/O or runs in the background lives in `eventbooker-runtime`;
//! this crate only describes shapes and rules.
//!
//! ## Example
//!
//! ```ignore
//! use eventbooker_core::capacity::admit;
//!
//! let admission = admit(&event, occupied, clock.now())?;
//! let reservation = tx
//!     .insert_reservation(NewReservation {
//!         user_id,
//!         event_id: event.id,
//!         status: admission.status(),
//!         expires_at: admission.expires_at(),
//!         created_at: clock.now(),
//!     })
//!     .await?;
//! ```

pub mod capacity;
pub mod error;
pub mod notify;
pub mod pagination;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Duration, Utc};
pub use error::{BookingError, CatalogError, StoreError, StoreResult};
pub use notify::{NotificationMessage, Notifier, NotifyError};
pub use pagination::{PageError, PageMode, PageRequest};
pub use store::{BookingStore, BookingTransaction, run_in_transaction};
pub use types::{
    ChatId, Event, EventId, EventStatus, EventSummary, ExpiredReservation, NewEvent,
    NewReservation, Reservation, ReservationDetails, ReservationId, ReservationKey,
    ReservationStatus, UserId,
};

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Every timestamp the engine writes or compares (reservation creation, hold expiry,
    /// "event already passed", sweep cut-off) comes from a `Clock`.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
