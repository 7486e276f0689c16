//! Capacity under concurrent booking.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::Duration;
use eventbooker_core::environment::Clock;
use eventbooker_core::error::BookingError;
use eventbooker_core::store::BookingStore;
use eventbooker_core::types::{EventId, NewEvent, ReservationStatus, UserId};
use eventbooker_runtime::ReservationWorkflow;
use eventbooker_testing::{FixedClock, InMemoryBookingStore, test_clock};
use proptest::prelude::*;
use std::sync::Arc;

async fn event_with_capacity(
    store: &InMemoryBookingStore,
    total_place: i32,
    requires_confirmation: bool,
) -> EventId {
    let now = test_clock().now();
    store
        .insert_event(
            NewEvent {
                title: "Sold out show".to_string(),
                description: String::new(),
                event_date: now + Duration::days(1),
                total_place,
                reservation_period: Duration::minutes(10),
                requires_confirmation,
            },
            now - Duration::hours(1),
        )
        .await
        .unwrap()
        .id
}

async fn book_concurrently(
    workflow: &ReservationWorkflow<InMemoryBookingStore, FixedClock>,
    event_id: EventId,
    attempts: i64,
) -> (usize, usize) {
    let handles: Vec<_> = (0..attempts)
        .map(|user| {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.book(UserId::new(user), event_id).await })
        })
        .collect();

    let mut booked = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(BookingError::NoSeatsAvailable) => refused += 1,
            Err(other) => panic!("unexpected booking error: {other}"),
        }
    }
    (booked, refused)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_never_exceed_capacity() {
    let store = Arc::new(InMemoryBookingStore::new());
    let event_id = event_with_capacity(&store, 10, true).await;
    let workflow = ReservationWorkflow::new(Arc::clone(&store), Arc::new(test_clock()));

    let (booked, refused) = book_concurrently(&workflow, event_id, 25).await;

    assert_eq!(booked, 10);
    assert_eq!(refused, 15);
    assert_eq!(store.count_occupied_seats(event_id).await.unwrap(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn last_seat_goes_to_exactly_one_of_two() {
    let store = Arc::new(InMemoryBookingStore::new());
    let event_id = event_with_capacity(&store, 1, false).await;
    let workflow = ReservationWorkflow::new(Arc::clone(&store), Arc::new(test_clock()));

    let (first, second) = tokio::join!(
        workflow.book(UserId::new(1), event_id),
        workflow.book(UserId::new(2), event_id)
    );

    let (winner, loser) = if first.is_ok() { (first, second) } else { (second, first) };
    assert_eq!(winner.unwrap().status, ReservationStatus::Confirmed);
    assert_eq!(loser.unwrap_err(), BookingError::NoSeatsAvailable);
}

#[tokio::test]
async fn cancelled_seat_can_be_booked_again() {
    let store = Arc::new(InMemoryBookingStore::new());
    let event_id = event_with_capacity(&store, 1, false).await;
    let workflow = ReservationWorkflow::new(Arc::clone(&store), Arc::new(test_clock()));

    let first = workflow.book(UserId::new(1), event_id).await.unwrap();
    assert_eq!(
        workflow.book(UserId::new(2), event_id).await.unwrap_err(),
        BookingError::NoSeatsAvailable
    );

    workflow.cancel(first.id, event_id, UserId::new(1)).await.unwrap();

    let second = workflow.book(UserId::new(2), event_id).await.unwrap();
    assert_eq!(second.status, ReservationStatus::Confirmed);
}

#[tokio::test]
async fn passed_event_cannot_be_booked() {
    let store = Arc::new(InMemoryBookingStore::new());
    let event_id = event_with_capacity(&store, 5, false).await;
    let later = FixedClock::new(test_clock().now() + Duration::days(2));
    let workflow = ReservationWorkflow::new(Arc::clone(&store), Arc::new(later));

    assert_eq!(
        workflow.book(UserId::new(1), event_id).await.unwrap_err(),
        BookingError::EventAlreadyPassed
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn exactly_capacity_bookings_succeed(capacity in 1i32..12, extra in 0i64..8) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(3)
            .enable_all()
            .build()
            .unwrap();

        let (booked, refused) = runtime.block_on(async {
            let store = Arc::new(InMemoryBookingStore::new());
            let event_id = event_with_capacity(&store, capacity, false).await;
            let workflow = ReservationWorkflow::new(Arc::clone(&store), Arc::new(test_clock()));
            book_concurrently(&workflow, event_id, i64::from(capacity) + extra).await
        });

        prop_assert_eq!(booked, usize::try_from(capacity).unwrap());
        prop_assert_eq!(refused, usize::try_from(extra).unwrap());
    }
}
