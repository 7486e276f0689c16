//! Reservation lifecycle: status derivation, transitions and per-user listing.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Duration;
use eventbooker_core::environment::Clock;
use eventbooker_core::error::BookingError;
use eventbooker_core::pagination::{PageError, PageMode, PageRequest};
use eventbooker_core::store::{BookingStore, BookingTransaction, run_in_transaction};
use eventbooker_core::types::{EventId, NewEvent, NewReservation, ReservationStatus, UserId};
use eventbooker_runtime::ReservationWorkflow;
use eventbooker_testing::{InMemoryBookingStore, ManualClock, properties, test_epoch};
use proptest::prelude::*;
use std::sync::Arc;

struct Fixture {
    store: Arc<InMemoryBookingStore>,
    clock: Arc<ManualClock>,
    workflow: ReservationWorkflow<InMemoryBookingStore, ManualClock>,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(InMemoryBookingStore::new());
        let clock = Arc::new(ManualClock::new(test_epoch()));
        let workflow = ReservationWorkflow::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            clock,
            workflow,
        }
    }

    async fn event(&self, title: &str, requires_confirmation: bool) -> EventId {
        self.store
            .insert_event(
                NewEvent {
                    title: title.to_string(),
                    description: format!("{title} description"),
                    event_date: self.clock.now() + Duration::days(30),
                    total_place: 100,
                    reservation_period: Duration::minutes(15),
                    requires_confirmation,
                },
                self.clock.now(),
            )
            .await
            .unwrap()
            .id
    }
}

#[tokio::test]
async fn initial_status_follows_event_policy() {
    let fx = Fixture::new();
    let with_confirmation = fx.event("Workshop", true).await;
    let without_confirmation = fx.event("Lecture", false).await;

    let pending = fx.workflow.book(UserId::new(1), with_confirmation).await.unwrap();
    let confirmed = fx.workflow.book(UserId::new(1), without_confirmation).await.unwrap();

    assert_eq!(pending.status, ReservationStatus::Pending);
    assert_eq!(pending.expires_at, Some(test_epoch() + Duration::minutes(15)));
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    assert_eq!(confirmed.expires_at, None);
}

#[tokio::test]
async fn book_confirm_cancel_frees_the_seat() {
    let fx = Fixture::new();
    let event_id = fx.event("Concert", true).await;
    let user = UserId::new(7);

    let reservation = fx.workflow.book(user, event_id).await.unwrap();
    assert_eq!(fx.store.count_occupied_seats(event_id).await.unwrap(), 1);

    fx.workflow.confirm(reservation.id, event_id, user).await.unwrap();
    let confirmed = fx.store.reservation(reservation.id).await.unwrap();
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    assert_eq!(confirmed.expires_at, None);
    assert_eq!(fx.store.count_occupied_seats(event_id).await.unwrap(), 1);

    fx.workflow.cancel(reservation.id, event_id, user).await.unwrap();
    let cancelled = fx.store.reservation(reservation.id).await.unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(fx.store.count_occupied_seats(event_id).await.unwrap(), 0);
}

#[tokio::test]
async fn failed_cancel_commit_keeps_the_seat() {
    let fx = Fixture::new();
    let event_id = fx.event("Play", false).await;
    let user = UserId::new(3);
    let reservation = fx.workflow.book(user, event_id).await.unwrap();

    fx.store.fail_commit(true);
    let err = fx.workflow.cancel(reservation.id, event_id, user).await.unwrap_err();
    assert!(matches!(err, BookingError::Storage(_)));
    fx.store.fail_commit(false);

    assert_eq!(fx.store.count_occupied_seats(event_id).await.unwrap(), 1);
    assert_eq!(
        fx.store.reservation(reservation.id).await.unwrap().status,
        ReservationStatus::Confirmed
    );
}

#[tokio::test]
async fn confirm_with_wrong_event_is_not_found() {
    let fx = Fixture::new();
    let event_id = fx.event("Festival", true).await;
    let other_event = fx.event("Other festival", true).await;
    let user = UserId::new(1);
    let reservation = fx.workflow.book(user, event_id).await.unwrap();

    assert_eq!(
        fx.workflow.confirm(reservation.id, other_event, user).await,
        Err(BookingError::BookingNotFound)
    );
}

#[tokio::test]
async fn confirm_on_unknown_event_is_event_not_found() {
    let fx = Fixture::new();
    let event_id = fx.event("Expo", true).await;
    let user = UserId::new(1);
    let reservation = fx.workflow.book(user, event_id).await.unwrap();

    assert_eq!(
        fx.workflow.confirm(reservation.id, EventId::new(12_345), user).await,
        Err(BookingError::EventNotFound)
    );
}

#[tokio::test]
async fn user_listing_pages_in_both_directions() {
    let fx = Fixture::new();
    let event_id = fx.event("Series", false).await;
    let user = UserId::new(42);

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(fx.workflow.book(user, event_id).await.unwrap());
        fx.clock.advance(Duration::seconds(1));
    }
    fx.workflow.book(UserId::new(99), event_id).await.unwrap();

    assert_eq!(fx.workflow.count_by_user(user).await.unwrap(), 5);

    let first = fx
        .workflow
        .list_by_user(user, PageRequest::first(2).unwrap())
        .await
        .unwrap();
    assert_eq!(
        first.iter().map(|d| d.reservation.id).collect::<Vec<_>>(),
        vec![ids[0].id, ids[1].id]
    );
    assert_eq!(first[0].event_title, "Series");
    assert_eq!(first[0].event_description, "Series description");

    let cursor = &first[1].reservation;
    let next = fx
        .workflow
        .list_by_user(
            user,
            PageRequest::new(PageMode::Next, cursor.created_at, cursor.id.get(), 10).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(next.len(), 3);
    assert_eq!(next[0].reservation.id, ids[2].id);

    let last = &ids[4];
    let prev = fx
        .workflow
        .list_by_user(
            user,
            PageRequest::parse("prev", last.created_at, last.id.get(), 2).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        prev.iter().map(|d| d.reservation.id).collect::<Vec<_>>(),
        vec![ids[3].id, ids[2].id]
    );
}

#[test]
fn unknown_page_mode_is_rejected_before_the_store() {
    let err = PageRequest::parse("backwards", test_epoch(), 0, 10).unwrap_err();
    assert_eq!(err, PageError::InvalidPageMode("backwards".to_string()));
}

#[tokio::test]
async fn panic_inside_transaction_rolls_back_and_keeps_unwinding() {
    let fx = Fixture::new();
    let event_id = fx.event("Fire drill", true).await;
    let now = fx.clock.now();

    let store = Arc::clone(&fx.store);
    let joined = tokio::spawn(async move {
        run_in_transaction(store.as_ref(), move |tx| {
            Box::pin(async move {
                let reservation = tx
                    .insert_reservation(NewReservation {
                        user_id: UserId::new(1),
                        event_id,
                        status: ReservationStatus::Pending,
                        expires_at: Some(now + Duration::minutes(5)),
                        created_at: now,
                    })
                    .await?;
                assert!(reservation.id.get() < 0, "step failed after insert");
                Ok::<(), BookingError>(())
            })
        })
        .await
    })
    .await;

    let err = joined.unwrap_err();
    assert!(err.is_panic());
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str));
    assert_eq!(message, Some("step failed after insert"));

    assert_eq!(fx.store.count_occupied_seats(event_id).await.unwrap(), 0);
    assert!(fx.store.reservations().await.is_empty());

    // The store lock was released by the unwinding transaction.
    fx.workflow.book(UserId::new(2), event_id).await.unwrap();
    assert_eq!(fx.store.count_occupied_seats(event_id).await.unwrap(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn nothing_ever_returns_to_pending(requests in properties::transition_requests(8)) {
        let statuses = tokio_test::block_on(async {
            let fx = Fixture::new();
            let event_id = fx.event("Random walk", true).await;
            let user = UserId::new(5);
            let reservation = fx.workflow.book(user, event_id).await.unwrap();

            let mut seen = Vec::new();
            for confirm in requests {
                let _ = if confirm {
                    fx.workflow.confirm(reservation.id, event_id, user).await
                } else {
                    fx.workflow.cancel(reservation.id, event_id, user).await
                };
                seen.push(fx.store.reservation(reservation.id).await.unwrap().status);
            }
            seen
        });

        prop_assert!(statuses.iter().all(|s| *s != ReservationStatus::Pending));
        if let Some(pos) = statuses.iter().position(|s| *s == ReservationStatus::Cancelled) {
            prop_assert!(statuses[pos..].iter().all(|s| *s == ReservationStatus::Cancelled));
        }
    }

    #[test]
    fn transitions_match_allowed_predecessors(
        from in properties::reservation_status(),
        to in properties::reservation_status(),
    ) {
        let allowed = to.allowed_predecessors().contains(&from);
        prop_assert_eq!(from.can_transition_to(to), allowed);
        if to == ReservationStatus::Pending {
            prop_assert!(!allowed);
        }
    }
}
