//! Storage collaborator traits.
//!
//! The engine never talks to a database directly. It reads and writes events and reservations
//! through [`BookingStore`], and scopes every mutating workflow step in a
//! [`BookingTransaction`] obtained from [`BookingStore::begin`].
//!
//! # Implementations
//!
//! - `PostgresBookingStore` (in `eventbooker-postgres`): production implementation
//! - `InMemoryBookingStore` (in `eventbooker-testing`): fast, deterministic testing
//!
//! # Isolation
//!
//! Implementations must make [`BookingTransaction::lock_event`] exclusive per event for the
//! lifetime of the transaction. Two transactions that lock the same event therefore run their
//! occupancy-count-then-insert steps one after the other, which is what keeps the number of
//! pending and confirmed reservations within the event's capacity.

use crate::error::{StoreError, StoreResult};
use crate::pagination::PageRequest;
use crate::types::{
    Event, EventId, ExpiredReservation, NewEvent, NewReservation, Reservation, ReservationDetails,
    ReservationKey, ReservationStatus, UserId,
};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::future::Future;

/// One open unit of work against the store.
///
/// Dropping a transaction without calling [`commit`](Self::commit) must discard its writes.
/// This is what rolls back a transaction whose workflow step panicked.
pub trait BookingTransaction: Send {
    /// Load an event and hold an exclusive lock on it until the transaction ends.
    ///
    /// Returns `Ok(None)` if the event does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn lock_event(
        &mut self,
        event_id: EventId,
    ) -> impl Future<Output = StoreResult<Option<Event>>> + Send;

    /// Count reservations of the event that hold a seat (pending or confirmed).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn count_occupied_seats(
        &mut self,
        event_id: EventId,
    ) -> impl Future<Output = StoreResult<i64>> + Send;

    /// Insert a reservation and return it with its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    fn insert_reservation(
        &mut self,
        reservation: NewReservation,
    ) -> impl Future<Output = StoreResult<Reservation>> + Send;

    /// Move the reservation identified by `key` to `status`.
    ///
    /// The change applies only if the reservation, event and user identifiers all match and
    /// the current status is one of `status.allowed_predecessors()`. Leaving pending clears the
    /// hold expiry.
    ///
    /// Returns `true` if a reservation was updated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    fn update_reservation_status(
        &mut self,
        key: ReservationKey,
        status: ReservationStatus,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Make every write of this transaction visible.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transaction`] if the commit fails.
    fn commit(self) -> impl Future<Output = StoreResult<()>> + Send;

    /// Discard every write of this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transaction`] if the rollback fails.
    fn rollback(self) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Typed access to events and reservations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store is shared by every request handler, the
/// expiration sweeper and the event catalog.
pub trait BookingStore: Send + Sync {
    /// Transaction type handed out by [`begin`](Self::begin).
    type Transaction: BookingTransaction + 'static;

    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unavailable.
    fn begin(&self) -> impl Future<Output = StoreResult<Self::Transaction>> + Send;

    /// Insert an event with status pending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    fn insert_event(
        &self,
        event: NewEvent,
        created_at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Event>> + Send;

    /// Load an event without locking it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn get_event(&self, event_id: EventId) -> impl Future<Output = StoreResult<Option<Event>>> + Send;

    /// Page through events by `(created_at, id)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn list_events(&self, page: PageRequest) -> impl Future<Output = StoreResult<Vec<Event>>> + Send;

    /// Count all events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn count_events(&self) -> impl Future<Output = StoreResult<i64>> + Send;

    /// Count reservations of the event that hold a seat, outside any transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn count_occupied_seats(&self, event_id: EventId) -> impl Future<Output = StoreResult<i64>> + Send;

    /// Page through a user's reservations by `(created_at, id)`, joined with their events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn list_user_reservations(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> impl Future<Output = StoreResult<Vec<ReservationDetails>>> + Send;

    /// Count every reservation a user has, in any status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn count_user_reservations(&self, user_id: UserId) -> impl Future<Output = StoreResult<i64>> + Send;

    /// Pending reservations with `expires_at < now`, with the context needed to notify owners.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn list_expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Vec<ExpiredReservation>>> + Send;

    /// Delete pending reservations with `expires_at < now` in one statement.
    ///
    /// The status condition is evaluated by the delete itself, so reservations confirmed or
    /// cancelled after they were listed survive. Returns the number of deleted rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    fn delete_expired_reservations(&self, now: DateTime<Utc>) -> impl Future<Output = StoreResult<u64>> + Send;
}

/// Run `f` inside one transaction.
///
/// - `Ok` from `f`: the transaction is committed; a commit failure is returned as an error.
/// - `Err` from `f`: the transaction is rolled back and the original error is returned.
/// - Panic inside `f`: the transaction is dropped uncommitted, which rolls it back, and the
///   panic keeps unwinding.
///
/// # Example
///
/// ```ignore
/// let reservation = run_in_transaction(&store, move |tx| {
///     Box::pin(book_in(tx, user_id, event_id, now))
/// })
/// .await?;
/// ```
///
/// # Errors
///
/// Returns the error produced by `f`, or a [`StoreError`] (converted into `E`) if the
/// transaction cannot be opened or committed.
pub async fn run_in_transaction<S, T, E, F>(store: &S, f: F) -> Result<T, E>
where
    S: BookingStore,
    E: From<StoreError> + std::fmt::Display,
    F: for<'t> FnOnce(&'t mut S::Transaction) -> BoxFuture<'t, Result<T, E>>,
{
    let mut tx = store.begin().await?;

    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    error = %rollback_err,
                    original_error = %err,
                    "Failed to roll back transaction"
                );
            }
            Err(err)
        }
    }
}
