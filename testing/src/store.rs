//! In-memory [`BookingStore`] for tests.
//!
//! Transactions take the store lock for their whole lifetime and work on a private copy of the
//! state: commit writes the copy back, anything else (rollback, error, drop during a panic)
//! discards it. Transactions are therefore fully serialized, which trivially satisfies the
//! per-event lock the trait requires.
//!
//! Faults can be injected per operation to exercise storage-failure paths, and the expired
//! delete can be parked behind a [`DeleteGate`] to act between a sweep's list and its delete.

use chrono::{DateTime, Utc};
use eventbooker_core::error::{StoreError, StoreResult};
use eventbooker_core::pagination::PageRequest;
use eventbooker_core::store::{BookingStore, BookingTransaction};
use eventbooker_core::types::{
    ChatId, Event, EventId, EventStatus, ExpiredReservation, NewEvent, NewReservation,
    Reservation, ReservationDetails, ReservationId, ReservationKey, ReservationStatus, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct State {
    events: BTreeMap<EventId, Event>,
    reservations: BTreeMap<ReservationId, Reservation>,
    users: HashMap<UserId, Option<ChatId>>,
    last_event_id: i64,
    last_reservation_id: i64,
}

impl State {
    fn occupied(&self, event_id: EventId) -> i64 {
        let count = self
            .reservations
            .values()
            .filter(|r| r.event_id == event_id && r.status.occupies_seat())
            .count();
        i64::try_from(count).unwrap_or(i64::MAX)
    }

    fn insert_reservation(&mut self, new: NewReservation) -> Reservation {
        self.last_reservation_id += 1;
        let reservation = Reservation {
            id: ReservationId::new(self.last_reservation_id),
            user_id: new.user_id,
            event_id: new.event_id,
            status: new.status,
            expires_at: new.expires_at,
            created_at: new.created_at,
        };
        self.reservations.insert(reservation.id, reservation.clone());
        reservation
    }
}

#[derive(Debug, Default)]
struct Faults {
    begin: AtomicBool,
    commit: AtomicBool,
    list_expired: AtomicBool,
    delete_expired: AtomicBool,
}

fn injected(operation: &str) -> StoreError {
    StoreError::Database(format!("injected {operation} failure"))
}

/// Parks the next [`BookingStore::delete_expired_reservations`] call until released.
#[derive(Debug, Default)]
pub struct DeleteGate {
    reached: Notify,
    released: Notify,
}

impl DeleteGate {
    /// Wait until a delete is parked at the gate.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the parked delete run.
    pub fn release(&self) {
        self.released.notify_one();
    }
}

/// Booking store kept entirely in memory.
///
/// Cloning shares the underlying state.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBookingStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Faults>,
    delete_gate: Arc<std::sync::Mutex<Option<Arc<DeleteGate>>>>,
}

impl InMemoryBookingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user and the chat their notifications go to.
    pub async fn register_user(&self, user_id: UserId, chat_id: Option<ChatId>) {
        self.state.lock().await.users.insert(user_id, chat_id);
    }

    /// Insert a reservation directly, bypassing the capacity gate.
    pub async fn seed_reservation(
        &self,
        user_id: UserId,
        event_id: EventId,
        status: ReservationStatus,
        expires_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Reservation {
        self.state.lock().await.insert_reservation(NewReservation {
            user_id,
            event_id,
            status,
            expires_at,
            created_at,
        })
    }

    /// Committed state of one reservation.
    pub async fn reservation(&self, id: ReservationId) -> Option<Reservation> {
        self.state.lock().await.reservations.get(&id).cloned()
    }

    /// Every committed reservation, ordered by id.
    pub async fn reservations(&self) -> Vec<Reservation> {
        self.state.lock().await.reservations.values().cloned().collect()
    }

    /// Make [`BookingStore::begin`] fail.
    pub fn fail_begin(&self, fail: bool) {
        self.faults.begin.store(fail, Ordering::SeqCst);
    }

    /// Make [`BookingTransaction::commit`] fail.
    pub fn fail_commit(&self, fail: bool) {
        self.faults.commit.store(fail, Ordering::SeqCst);
    }

    /// Make [`BookingStore::list_expired_reservations`] fail.
    pub fn fail_list_expired(&self, fail: bool) {
        self.faults.list_expired.store(fail, Ordering::SeqCst);
    }

    /// Make [`BookingStore::delete_expired_reservations`] fail.
    pub fn fail_delete_expired(&self, fail: bool) {
        self.faults.delete_expired.store(fail, Ordering::SeqCst);
    }

    /// Park the next [`BookingStore::delete_expired_reservations`] call behind the returned
    /// gate. Only that one call waits.
    #[must_use]
    pub fn gate_delete_expired(&self) -> Arc<DeleteGate> {
        let gate = Arc::new(DeleteGate::default());
        *self.delete_gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&gate));
        gate
    }
}

/// Transaction over [`InMemoryBookingStore`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    working: State,
    faults: Arc<Faults>,
}

impl BookingTransaction for InMemoryTransaction {
    async fn lock_event(&mut self, event_id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.working.events.get(&event_id).cloned())
    }

    async fn count_occupied_seats(&mut self, event_id: EventId) -> StoreResult<i64> {
        Ok(self.working.occupied(event_id))
    }

    async fn insert_reservation(&mut self, reservation: NewReservation) -> StoreResult<Reservation> {
        Ok(self.working.insert_reservation(reservation))
    }

    async fn update_reservation_status(
        &mut self,
        key: ReservationKey,
        status: ReservationStatus,
    ) -> StoreResult<bool> {
        let Some(reservation) = self.working.reservations.get_mut(&key.reservation_id) else {
            return Ok(false);
        };

        if reservation.event_id != key.event_id
            || reservation.user_id != key.user_id
            || !status.allowed_predecessors().contains(&reservation.status)
        {
            return Ok(false);
        }

        reservation.status = status;
        reservation.expires_at = None;
        Ok(true)
    }

    async fn commit(self) -> StoreResult<()> {
        if self.faults.commit.load(Ordering::SeqCst) {
            return Err(StoreError::Transaction("injected commit failure".to_string()));
        }
        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

impl BookingStore for InMemoryBookingStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> StoreResult<InMemoryTransaction> {
        if self.faults.begin.load(Ordering::SeqCst) {
            return Err(injected("begin"));
        }
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            faults: Arc::clone(&self.faults),
        })
    }

    async fn insert_event(&self, event: NewEvent, created_at: DateTime<Utc>) -> StoreResult<Event> {
        let mut state = self.state.lock().await;
        state.last_event_id += 1;
        let event = Event {
            id: EventId::new(state.last_event_id),
            title: event.title,
            description: event.description,
            event_date: event.event_date,
            status: EventStatus::Pending,
            total_place: event.total_place,
            reservation_period: event.reservation_period,
            requires_confirmation: event.requires_confirmation,
            created_at,
        };
        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, event_id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.state.lock().await.events.get(&event_id).cloned())
    }

    async fn list_events(&self, page: PageRequest) -> StoreResult<Vec<Event>> {
        let state = self.state.lock().await;
        Ok(page.apply(state.events.values().cloned(), |e| (e.created_at, e.id.get())))
    }

    async fn count_events(&self) -> StoreResult<i64> {
        let count = self.state.lock().await.events.len();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn count_occupied_seats(&self, event_id: EventId) -> StoreResult<i64> {
        Ok(self.state.lock().await.occupied(event_id))
    }

    async fn list_user_reservations(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> StoreResult<Vec<ReservationDetails>> {
        let state = self.state.lock().await;
        let rows = state
            .reservations
            .values()
            .filter(|r| r.user_id == user_id)
            .filter_map(|r| {
                state.events.get(&r.event_id).map(|e| ReservationDetails {
                    reservation: r.clone(),
                    event_title: e.title.clone(),
                    event_description: e.description.clone(),
                    event_date: e.event_date,
                })
            });
        Ok(page.apply(rows, |d| (d.reservation.created_at, d.reservation.id.get())))
    }

    async fn count_user_reservations(&self, user_id: UserId) -> StoreResult<i64> {
        let state = self.state.lock().await;
        let count = state.reservations.values().filter(|r| r.user_id == user_id).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn list_expired_reservations(&self, now: DateTime<Utc>) -> StoreResult<Vec<ExpiredReservation>> {
        if self.faults.list_expired.load(Ordering::SeqCst) {
            return Err(injected("list expired"));
        }
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| is_lapsed(r, now))
            .filter_map(|r| {
                state.events.get(&r.event_id).map(|e| ExpiredReservation {
                    reservation_id: r.id,
                    chat_id: state.users.get(&r.user_id).copied().flatten(),
                    event_title: e.title.clone(),
                    event_date: e.event_date,
                })
            })
            .collect())
    }

    async fn delete_expired_reservations(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        if self.faults.delete_expired.load(Ordering::SeqCst) {
            return Err(injected("delete expired"));
        }
        let gate = self.delete_gate.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(gate) = gate {
            gate.reached.notify_one();
            gate.released.notified().await;
        }
        let mut state = self.state.lock().await;
        let before = state.reservations.len();
        state.reservations.retain(|_, r| !is_lapsed(r, now));
        Ok(u64::try_from(before - state.reservations.len()).unwrap_or(u64::MAX))
    }
}

fn is_lapsed(reservation: &Reservation, now: DateTime<Utc>) -> bool {
    reservation.status == ReservationStatus::Pending
        && reservation.expires_at.is_some_and(|expires_at| expires_at < now)
}
