//! Reservation workflow: book, confirm, cancel and list.
//!
//! Every mutating call is one transaction obtained through
//! [`run_in_transaction`](eventbooker_core::store::run_in_transaction). Booking locks the event
//! row first, so the occupancy count and the insert that follows cannot interleave with another
//! booking of the same event.

use crate::metrics::BookingMetrics;
use eventbooker_core::capacity::admit;
use eventbooker_core::environment::Clock;
use eventbooker_core::error::BookingError;
use eventbooker_core::pagination::PageRequest;
use eventbooker_core::store::{BookingStore, BookingTransaction, run_in_transaction};
use eventbooker_core::types::{
    EventId, NewReservation, Reservation, ReservationDetails, ReservationId, ReservationKey,
    ReservationStatus, UserId,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Entry point for per-request reservation operations.
pub struct ReservationWorkflow<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> Clone for ReservationWorkflow<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, C> ReservationWorkflow<S, C>
where
    S: BookingStore,
    C: Clock,
{
    /// Create a workflow over `store`, reading time from `clock`.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Reserve one seat of `event_id` for `user_id`.
    ///
    /// The reservation starts confirmed, or pending with a hold of the event's reservation
    /// period if the event requires confirmation.
    ///
    /// # Errors
    ///
    /// - [`BookingError::EventNotFound`] if the event does not exist
    /// - [`BookingError::EventAlreadyPassed`] if the event is not in the future
    /// - [`BookingError::NoSeatsAvailable`] if every seat is held or confirmed
    /// - [`BookingError::InvalidHoldDuration`] if the hold expiry cannot be represented
    /// - [`BookingError::Storage`] if the store fails
    #[tracing::instrument(skip(self), name = "booking_book")]
    pub async fn book(&self, user_id: UserId, event_id: EventId) -> Result<Reservation, BookingError> {
        let started = Instant::now();
        let now = self.clock.now();

        let result = run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(book_in(tx, user_id, event_id, now))
        })
        .await;

        match &result {
            Ok(reservation) => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    status = %reservation.status,
                    "Reservation created"
                );
                BookingMetrics::record_created(reservation.status.as_str(), started.elapsed());
            }
            Err(err) => observe_failure("book", err),
        }
        result
    }

    /// Confirm a pending reservation.
    ///
    /// Confirming an already confirmed reservation succeeds without changes.
    ///
    /// # Errors
    ///
    /// - [`BookingError::EventNotFound`] if the event does not exist
    /// - [`BookingError::BookingNotRequired`] if the event does not use confirmation
    /// - [`BookingError::BookingNotFound`] if no reservation matches the
    ///   (reservation, event, user) triple, or it was cancelled
    /// - [`BookingError::Storage`] if the store fails
    #[tracing::instrument(skip(self), name = "booking_confirm")]
    pub async fn confirm(
        &self,
        reservation_id: ReservationId,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<(), BookingError> {
        let key = ReservationKey {
            reservation_id,
            event_id,
            user_id,
        };

        let result = run_in_transaction(self.store.as_ref(), move |tx| Box::pin(confirm_in(tx, key))).await;

        match &result {
            Ok(()) => {
                tracing::info!("Reservation confirmed");
                BookingMetrics::record_confirmed();
            }
            Err(err) => observe_failure("confirm", err),
        }
        result
    }

    /// Cancel a reservation in any status, freeing its seat on commit.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] if no reservation matches the
    ///   (reservation, event, user) triple
    /// - [`BookingError::Storage`] if the store fails
    #[tracing::instrument(skip(self), name = "booking_cancel")]
    pub async fn cancel(
        &self,
        reservation_id: ReservationId,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<(), BookingError> {
        let key = ReservationKey {
            reservation_id,
            event_id,
            user_id,
        };

        let result = run_in_transaction(self.store.as_ref(), move |tx| Box::pin(cancel_in(tx, key))).await;

        match &result {
            Ok(()) => {
                tracing::info!("Reservation cancelled");
                BookingMetrics::record_cancelled();
            }
            Err(err) => observe_failure("cancel", err),
        }
        result
    }

    /// One page of a user's reservations with their events.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] if the store fails.
    pub async fn list_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<ReservationDetails>, BookingError> {
        self.store
            .list_user_reservations(user_id, page)
            .await
            .map_err(|e| {
                let err = BookingError::from(e);
                observe_failure("list_by_user", &err);
                err
            })
    }

    /// Total reservations a user has, in any status.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] if the store fails.
    pub async fn count_by_user(&self, user_id: UserId) -> Result<i64, BookingError> {
        self.store.count_user_reservations(user_id).await.map_err(|e| {
            let err = BookingError::from(e);
            observe_failure("count_by_user", &err);
            err
        })
    }
}

async fn book_in<T: BookingTransaction>(
    tx: &mut T,
    user_id: UserId,
    event_id: EventId,
    now: DateTime<Utc>,
) -> Result<Reservation, BookingError> {
    let event = tx
        .lock_event(event_id)
        .await?
        .ok_or(BookingError::EventNotFound)?;

    let occupied = tx.count_occupied_seats(event_id).await?;
    let admission = admit(&event, occupied, now)?;

    let reservation = tx
        .insert_reservation(NewReservation {
            user_id,
            event_id,
            status: admission.status(),
            expires_at: admission.expires_at(),
            created_at: now,
        })
        .await?;

    Ok(reservation)
}

async fn confirm_in<T: BookingTransaction>(tx: &mut T, key: ReservationKey) -> Result<(), BookingError> {
    let event = tx
        .lock_event(key.event_id)
        .await?
        .ok_or(BookingError::EventNotFound)?;

    if !event.requires_confirmation {
        return Err(BookingError::BookingNotRequired);
    }

    if !tx
        .update_reservation_status(key, ReservationStatus::Confirmed)
        .await?
    {
        return Err(BookingError::BookingNotFound);
    }
    Ok(())
}

async fn cancel_in<T: BookingTransaction>(tx: &mut T, key: ReservationKey) -> Result<(), BookingError> {
    if !tx
        .update_reservation_status(key, ReservationStatus::Cancelled)
        .await?
    {
        return Err(BookingError::BookingNotFound);
    }
    Ok(())
}

fn observe_failure(operation: &'static str, err: &BookingError) {
    if err.is_domain() {
        tracing::debug!(operation, error = %err, "Booking request refused");
        BookingMetrics::record_rejected(rejection_reason(err));
    } else {
        tracing::error!(operation, error = %err, "Booking request failed");
        BookingMetrics::record_storage_error();
    }
}

const fn rejection_reason(err: &BookingError) -> &'static str {
    match err {
        BookingError::EventNotFound => "event_not_found",
        BookingError::EventAlreadyPassed => "event_already_passed",
        BookingError::NoSeatsAvailable => "no_seats_available",
        BookingError::BookingNotFound => "booking_not_found",
        BookingError::BookingNotRequired => "booking_not_required",
        BookingError::InvalidHoldDuration => "invalid_hold_duration",
        BookingError::Storage(_) => "storage",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use eventbooker_core::types::{EventStatus, NewEvent};
    use eventbooker_testing::{InMemoryBookingStore, test_clock};

    async fn setup(
        total_place: i32,
        requires_confirmation: bool,
    ) -> (
        ReservationWorkflow<InMemoryBookingStore, eventbooker_testing::FixedClock>,
        Arc<InMemoryBookingStore>,
        EventId,
    ) {
        let store = Arc::new(InMemoryBookingStore::new());
        let clock = Arc::new(test_clock());
        let event = store
            .insert_event(
                NewEvent {
                    title: "Rust meetup".to_string(),
                    description: "Talks".to_string(),
                    event_date: clock.now() + Duration::days(3),
                    total_place,
                    reservation_period: Duration::minutes(20),
                    requires_confirmation,
                },
                clock.now() - Duration::days(1),
            )
            .await
            .unwrap();
        assert_eq!(event.status, EventStatus::Pending);

        (ReservationWorkflow::new(Arc::clone(&store), clock), store, event.id)
    }

    #[tokio::test]
    async fn booking_requiring_confirmation_holds_seat() {
        let (workflow, _store, event_id) = setup(5, true).await;

        let reservation = workflow.book(UserId::new(1), event_id).await.unwrap();

        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(
            reservation.expires_at,
            Some(test_clock().now() + Duration::minutes(20))
        );
        assert_eq!(reservation.created_at, test_clock().now());
    }

    #[tokio::test]
    async fn booking_without_confirmation_is_confirmed() {
        let (workflow, _store, event_id) = setup(5, false).await;

        let reservation = workflow.book(UserId::new(1), event_id).await.unwrap();

        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.expires_at, None);
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let (workflow, _store, _event_id) = setup(5, false).await;

        let err = workflow.book(UserId::new(1), EventId::new(999)).await.unwrap_err();
        assert_eq!(err, BookingError::EventNotFound);
    }

    #[tokio::test]
    async fn unrepresentable_hold_is_refused_without_booking() {
        let store = Arc::new(InMemoryBookingStore::new());
        let clock = Arc::new(test_clock());
        let event = store
            .insert_event(
                NewEvent {
                    title: "Far future".to_string(),
                    description: String::new(),
                    event_date: clock.now() + Duration::days(3),
                    total_place: 5,
                    reservation_period: Duration::seconds(9_000_000_000_000),
                    requires_confirmation: true,
                },
                clock.now(),
            )
            .await
            .unwrap();
        let workflow = ReservationWorkflow::new(Arc::clone(&store), clock);

        let err = workflow.book(UserId::new(1), event.id).await.unwrap_err();

        assert_eq!(err, BookingError::InvalidHoldDuration);
        assert!(err.is_domain());
        assert_eq!(store.count_occupied_seats(event.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn confirm_requires_confirmation_event() {
        let (workflow, _store, event_id) = setup(5, false).await;
        let reservation = workflow.book(UserId::new(1), event_id).await.unwrap();

        let err = workflow
            .confirm(reservation.id, event_id, UserId::new(1))
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::BookingNotRequired);
    }

    #[tokio::test]
    async fn other_users_cannot_confirm_or_cancel() {
        let (workflow, store, event_id) = setup(5, true).await;
        let reservation = workflow.book(UserId::new(1), event_id).await.unwrap();

        assert_eq!(
            workflow.confirm(reservation.id, event_id, UserId::new(2)).await,
            Err(BookingError::BookingNotFound)
        );
        assert_eq!(
            workflow.cancel(reservation.id, event_id, UserId::new(2)).await,
            Err(BookingError::BookingNotFound)
        );

        let stored = store.reservation(reservation.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn cancelled_reservation_cannot_be_confirmed() {
        let (workflow, _store, event_id) = setup(5, true).await;
        let user = UserId::new(1);
        let reservation = workflow.book(user, event_id).await.unwrap();

        workflow.cancel(reservation.id, event_id, user).await.unwrap();

        assert_eq!(
            workflow.confirm(reservation.id, event_id, user).await,
            Err(BookingError::BookingNotFound)
        );
    }

    #[tokio::test]
    async fn repeated_confirm_and_cancel_succeed() {
        let (workflow, store, event_id) = setup(5, true).await;
        let user = UserId::new(1);
        let reservation = workflow.book(user, event_id).await.unwrap();

        workflow.confirm(reservation.id, event_id, user).await.unwrap();
        workflow.confirm(reservation.id, event_id, user).await.unwrap();
        workflow.cancel(reservation.id, event_id, user).await.unwrap();
        workflow.cancel(reservation.id, event_id, user).await.unwrap();

        let stored = store.reservation(reservation.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Cancelled);
        assert_eq!(stored.expires_at, None);
    }

    #[tokio::test]
    async fn storage_failure_is_not_a_domain_error() {
        let (workflow, store, event_id) = setup(5, false).await;
        store.fail_begin(true);

        let err = workflow.book(UserId::new(1), event_id).await.unwrap_err();
        assert!(matches!(err, BookingError::Storage(_)));
        assert!(!err.is_domain());
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_reservation() {
        let (workflow, store, event_id) = setup(5, false).await;
        store.fail_commit(true);

        let err = workflow.book(UserId::new(1), event_id).await.unwrap_err();
        assert!(matches!(err, BookingError::Storage(_)));

        store.fail_commit(false);
        assert_eq!(store.count_occupied_seats(event_id).await.unwrap(), 0);
    }
}
