//! Event catalog: create, fetch and page through events with their occupancy.

use eventbooker_core::environment::Clock;
use eventbooker_core::error::CatalogError;
use eventbooker_core::pagination::PageRequest;
use eventbooker_core::store::BookingStore;
use eventbooker_core::types::{Event, EventId, EventSummary, NewEvent};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Read and create events.
pub struct EventCatalog<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> Clone for EventCatalog<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, C> EventCatalog<S, C>
where
    S: BookingStore,
    C: Clock,
{
    /// Create a catalog over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Validate and store a new event.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::EmptyTitle`] if the title is blank
    /// - [`CatalogError::InvalidEventDate`] if the date is not in the future
    /// - [`CatalogError::InvalidTotalPlace`] if the capacity is not positive
    /// - [`CatalogError::InvalidHoldDuration`] if the reservation period is not positive or
    ///   runs past the event date
    /// - [`CatalogError::Storage`] if the store fails
    #[tracing::instrument(skip(self, new_event), fields(title = %new_event.title))]
    pub async fn create_event(&self, new_event: NewEvent) -> Result<Event, CatalogError> {
        let now = self.clock.now();
        validate(&new_event, now)?;

        let event = self.store.insert_event(new_event, now).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to insert event");
            CatalogError::from(e)
        })?;

        tracing::info!(event_id = %event.id, "Event created");
        Ok(event)
    }

    /// Fetch one event with its occupied seat count.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::EventNotFound`] if the event does not exist
    /// - [`CatalogError::Storage`] if the store fails
    pub async fn get_event(&self, event_id: EventId) -> Result<EventSummary, CatalogError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(CatalogError::EventNotFound)?;

        self.summarize(event).await
    }

    /// One page of events, each with its occupied seat count.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Storage`] if the store fails.
    pub async fn list_events(&self, page: PageRequest) -> Result<Vec<EventSummary>, CatalogError> {
        let events = self.store.list_events(page).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to list events");
            CatalogError::from(e)
        })?;

        let mut summaries = Vec::with_capacity(events.len());
        for event in events {
            summaries.push(self.summarize(event).await?);
        }
        Ok(summaries)
    }

    /// Total number of events.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Storage`] if the store fails.
    pub async fn count_events(&self) -> Result<i64, CatalogError> {
        Ok(self.store.count_events().await?)
    }

    async fn summarize(&self, event: Event) -> Result<EventSummary, CatalogError> {
        let occupied_place = self.store.count_occupied_seats(event.id).await.map_err(|e| {
            tracing::error!(event_id = %event.id, error = %e, "Failed to count occupied seats");
            CatalogError::from(e)
        })?;
        Ok(EventSummary {
            event,
            occupied_place,
        })
    }
}

fn validate(new_event: &NewEvent, now: DateTime<Utc>) -> Result<(), CatalogError> {
    if new_event.title.trim().is_empty() {
        return Err(CatalogError::EmptyTitle);
    }
    if new_event.event_date <= now {
        return Err(CatalogError::InvalidEventDate);
    }
    if new_event.total_place <= 0 {
        return Err(CatalogError::InvalidTotalPlace);
    }
    if new_event.reservation_period <= Duration::zero()
        || new_event.reservation_period > new_event.event_date.signed_duration_since(now)
    {
        return Err(CatalogError::InvalidHoldDuration);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use eventbooker_core::pagination::PageMode;
    use eventbooker_testing::{FixedClock, InMemoryBookingStore, test_clock};

    fn catalog() -> (EventCatalog<InMemoryBookingStore, FixedClock>, Arc<InMemoryBookingStore>) {
        let store = Arc::new(InMemoryBookingStore::new());
        (EventCatalog::new(Arc::clone(&store), Arc::new(test_clock())), store)
    }

    fn new_event(title: &str) -> NewEvent {
        NewEvent {
            title: title.to_string(),
            description: String::new(),
            event_date: test_clock().now() + Duration::days(10),
            total_place: 50,
            reservation_period: Duration::hours(1),
            requires_confirmation: true,
        }
    }

    #[test]
    fn validation_rejects_each_bad_field() {
        let now = test_clock().now();

        let mut e = new_event("   ");
        assert_eq!(validate(&e, now), Err(CatalogError::EmptyTitle));

        e = new_event("Show");
        e.event_date = now;
        assert_eq!(validate(&e, now), Err(CatalogError::InvalidEventDate));

        e = new_event("Show");
        e.total_place = 0;
        assert_eq!(validate(&e, now), Err(CatalogError::InvalidTotalPlace));

        e = new_event("Show");
        e.reservation_period = Duration::zero();
        assert_eq!(validate(&e, now), Err(CatalogError::InvalidHoldDuration));

        e = new_event("Show");
        e.reservation_period = Duration::days(11);
        assert_eq!(validate(&e, now), Err(CatalogError::InvalidHoldDuration));

        e = new_event("Show");
        e.reservation_period = Duration::days(10);
        assert_eq!(validate(&e, now), Ok(()));

        assert_eq!(validate(&new_event("Show"), now), Ok(()));
    }

    #[tokio::test]
    async fn created_event_is_stamped_with_clock_time() {
        let (catalog, _store) = catalog();

        let event = catalog.create_event(new_event("Opera")).await.unwrap();

        assert_eq!(event.created_at, test_clock().now());
        assert_eq!(catalog.count_events().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_event_is_not_stored() {
        let (catalog, _store) = catalog();

        assert_eq!(
            catalog.create_event(new_event("")).await,
            Err(CatalogError::EmptyTitle)
        );
        assert_eq!(catalog.count_events().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn hold_past_calendar_range_is_refused_at_creation() {
        let (catalog, _store) = catalog();
        let mut e = new_event("Eclipse");
        e.reservation_period = Duration::seconds(9_000_000_000_000);

        assert_eq!(
            catalog.create_event(e).await,
            Err(CatalogError::InvalidHoldDuration)
        );
        assert_eq!(catalog.count_events().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_event_is_not_found() {
        let (catalog, _store) = catalog();
        assert_eq!(
            catalog.get_event(EventId::new(404)).await,
            Err(CatalogError::EventNotFound)
        );
    }

    #[tokio::test]
    async fn summary_reports_occupied_seats() {
        let (catalog, store) = catalog();
        let event = catalog.create_event(new_event("Ballet")).await.unwrap();
        store
            .seed_reservation(
                eventbooker_core::types::UserId::new(1),
                event.id,
                eventbooker_core::types::ReservationStatus::Pending,
                Some(test_clock().now() + Duration::hours(1)),
                test_clock().now(),
            )
            .await;
        store
            .seed_reservation(
                eventbooker_core::types::UserId::new(2),
                event.id,
                eventbooker_core::types::ReservationStatus::Cancelled,
                None,
                test_clock().now(),
            )
            .await;

        let summary = catalog.get_event(event.id).await.unwrap();
        assert_eq!(summary.occupied_place, 1);
        assert_eq!(summary.event, event);
    }

    #[tokio::test]
    async fn listing_pages_forward() {
        let (catalog, _store) = catalog();
        let first = catalog.create_event(new_event("A")).await.unwrap();
        let second = catalog.create_event(new_event("B")).await.unwrap();
        catalog.create_event(new_event("C")).await.unwrap();

        let page = PageRequest::new(PageMode::Next, first.created_at, first.id.get(), 1).unwrap();
        let listed = catalog.list_events(page).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].event.id, second.id);
        assert_eq!(listed[0].occupied_place, 0);
    }
}
