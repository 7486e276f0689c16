//! Row shapes returned by the booking queries and their mapping to domain types.

use chrono::{DateTime, Duration, Utc};
use eventbooker_core::error::StoreError;
use eventbooker_core::types::{
    ChatId, Event, EventId, ExpiredReservation, Reservation, ReservationDetails, ReservationId,
    UserId,
};

pub(crate) const EVENT_COLUMNS: &str = "id, title, description, event_date, status, total_place, \
     reservation_period_secs, requires_confirmation, created_at";

pub(crate) const RESERVATION_COLUMNS: &str = "id, user_id, event_id, status, expires_at, created_at";

#[derive(sqlx::FromRow)]
pub(crate) struct EventRow {
    id: i64,
    title: String,
    description: String,
    event_date: DateTime<Utc>,
    status: String,
    total_place: i32,
    reservation_period_secs: i64,
    requires_confirmation: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| StoreError::CorruptRow(format!("event {}: {e}", row.id)))?;
        let reservation_period = Duration::try_seconds(row.reservation_period_secs).ok_or_else(|| {
            StoreError::CorruptRow(format!(
                "event {}: reservation period {}s out of range",
                row.id, row.reservation_period_secs
            ))
        })?;

        Ok(Self {
            id: EventId::new(row.id),
            title: row.title,
            description: row.description,
            event_date: row.event_date,
            status,
            total_place: row.total_place,
            reservation_period,
            requires_confirmation: row.requires_confirmation,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ReservationRow {
    id: i64,
    user_id: i64,
    event_id: i64,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| StoreError::CorruptRow(format!("reservation {}: {e}", row.id)))?;

        Ok(Self {
            id: ReservationId::new(row.id),
            user_id: UserId::new(row.user_id),
            event_id: EventId::new(row.event_id),
            status,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ReservationDetailsRow {
    #[sqlx(flatten)]
    reservation: ReservationRow,
    event_title: String,
    event_description: String,
    event_date: DateTime<Utc>,
}

impl TryFrom<ReservationDetailsRow> for ReservationDetails {
    type Error = StoreError;

    fn try_from(row: ReservationDetailsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            reservation: row.reservation.try_into()?,
            event_title: row.event_title,
            event_description: row.event_description,
            event_date: row.event_date,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ExpiredRow {
    reservation_id: i64,
    chat_id: Option<i64>,
    event_title: String,
    event_date: DateTime<Utc>,
}

impl From<ExpiredRow> for ExpiredReservation {
    fn from(row: ExpiredRow) -> Self {
        Self {
            reservation_id: ReservationId::new(row.reservation_id),
            chat_id: row.chat_id.map(ChatId::new),
            event_title: row.event_title,
            event_date: row.event_date,
        }
    }
}

/// Map a batch of rows, failing on the first corrupt one.
pub(crate) fn map_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
