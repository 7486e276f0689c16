//! Domain types for the booking engine.
//!
//! Events and reservations are owned by the storage collaborator; the types here are the
//! shapes the engine reads and writes through the store traits.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(i64);

impl EventId {
    /// Create an `EventId` from its database value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner value
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReservationId(i64);

impl ReservationId {
    /// Create a `ReservationId` from its database value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner value
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    /// Create a `UserId` from its database value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner value
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination chat identifier on the messaging transport
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(i64);

impl ChatId {
    /// Create a `ChatId`
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner value
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status enums
// ============================================================================

/// Error returned when a status string does not name a known status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Lifecycle status of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Scheduled and open for booking
    Pending,
    /// Called off by the organizer
    Canceled,
    /// Already took place
    Expired,
}

impl EventStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for EventStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "canceled" => Ok(Self::Canceled),
            "expired" => Ok(Self::Expired),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Status of a reservation
///
/// `Confirmed` and `Cancelled` are terminal with respect to `Pending`: a reservation never
/// returns to `Pending` once it has left it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Holding a seat until the hold expires or the user confirms
    Pending,
    /// Seat is taken
    Confirmed,
    /// Seat was released by the user
    Cancelled,
}

impl ReservationStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a reservation in this status counts against event capacity.
    #[must_use]
    pub const fn occupies_seat(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Statuses from which a reservation may move to `self`.
    ///
    /// Re-applying the current status is allowed for the terminal states, so a repeated
    /// confirm or cancel succeeds without changing anything. Nothing moves back to
    /// `Pending`, and a cancelled reservation cannot be confirmed.
    #[must_use]
    pub const fn allowed_predecessors(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[],
            Self::Confirmed => &[Self::Pending, Self::Confirmed],
            Self::Cancelled => &[Self::Pending, Self::Confirmed, Self::Cancelled],
        }
    }

    /// Whether a reservation currently in `self` may move to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        next.allowed_predecessors().contains(self)
    }
}

impl FromStr for ReservationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Events
// ============================================================================

/// A scheduled event with a fixed number of seats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Title shown to users and in notifications
    pub title: String,
    /// Free-form description
    pub description: String,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
    /// Lifecycle status
    pub status: EventStatus,
    /// Total number of seats
    pub total_place: i32,
    /// How long a pending reservation holds its seat
    #[serde(with = "duration_secs")]
    pub reservation_period: Duration,
    /// Whether reservations start pending and need confirmation
    pub requires_confirmation: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Title, must not be blank
    pub title: String,
    /// Free-form description
    pub description: String,
    /// Must be in the future
    pub event_date: DateTime<Utc>,
    /// Must be positive
    pub total_place: i32,
    /// Must be positive
    #[serde(with = "duration_secs")]
    pub reservation_period: Duration,
    /// Whether reservations need confirmation
    pub requires_confirmation: bool,
}

/// An event together with its current seat occupancy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// The event
    #[serde(flatten)]
    pub event: Event,
    /// Reservations currently pending or confirmed
    pub occupied_place: i64,
}

// ============================================================================
// Reservations
// ============================================================================

/// A user's claim on one seat of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier
    pub id: ReservationId,
    /// Owning user
    pub user_id: UserId,
    /// Reserved event
    pub event_id: EventId,
    /// Current status
    pub status: ReservationStatus,
    /// End of the hold; only set while pending
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A reservation about to be inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReservation {
    /// Owning user
    pub user_id: UserId,
    /// Reserved event
    pub event_id: EventId,
    /// Initial status decided by the capacity gate
    pub status: ReservationStatus,
    /// End of the hold for pending reservations
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// The triple that must match for a status change to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReservationKey {
    /// Reservation identifier
    pub reservation_id: ReservationId,
    /// Event the reservation belongs to
    pub event_id: EventId,
    /// User that owns the reservation
    pub user_id: UserId,
}

/// A reservation joined with the event it is for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationDetails {
    /// The reservation
    #[serde(flatten)]
    pub reservation: Reservation,
    /// Event title
    pub event_title: String,
    /// Event description
    pub event_description: String,
    /// Event date
    pub event_date: DateTime<Utc>,
}

/// A pending reservation whose hold has lapsed, with what is needed to tell its owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiredReservation {
    /// Reservation identifier
    pub reservation_id: ReservationId,
    /// Owner's chat, if the owner linked one
    pub chat_id: Option<ChatId>,
    /// Event title
    pub event_title: String,
    /// Event date
    pub event_date: DateTime<Utc>,
}

/// Serialize a [`Duration`] as whole seconds.
pub mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as seconds.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    /// Deserialize from seconds.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error, or a custom error if the value is out of range.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Duration::try_seconds(secs)
            .ok_or_else(|| serde::de::Error::custom(format!("duration out of range: {secs}s")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn reservation_status_parses_database_strings() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<ReservationStatus>().unwrap(), status);
        }
        assert!("canceled".parse::<ReservationStatus>().is_err());
    }

    #[test]
    fn nothing_returns_to_pending() {
        for from in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
        ] {
            assert!(!from.can_transition_to(ReservationStatus::Pending));
        }
    }

    #[test]
    fn cancelled_cannot_be_confirmed() {
        assert!(!ReservationStatus::Cancelled.can_transition_to(ReservationStatus::Confirmed));
        assert!(ReservationStatus::Pending.can_transition_to(ReservationStatus::Confirmed));
        assert!(ReservationStatus::Confirmed.can_transition_to(ReservationStatus::Confirmed));
    }

    #[test]
    fn cancel_is_allowed_from_any_status() {
        for from in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
        ] {
            assert!(from.can_transition_to(ReservationStatus::Cancelled));
        }
    }

    #[test]
    fn only_pending_and_confirmed_occupy_seats() {
        assert!(ReservationStatus::Pending.occupies_seat());
        assert!(ReservationStatus::Confirmed.occupies_seat());
        assert!(!ReservationStatus::Cancelled.occupies_seat());
    }

    #[test]
    fn event_serializes_hold_as_seconds() {
        let event = Event {
            id: EventId::new(7),
            title: "Rust meetup".to_string(),
            description: String::new(),
            event_date: DateTime::parse_from_rfc3339("2030-01-01T18:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            status: EventStatus::Pending,
            total_place: 10,
            reservation_period: Duration::minutes(15),
            requires_confirmation: true,
            created_at: DateTime::parse_from_rfc3339("2029-12-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["reservation_period"], 900);
        assert_eq!(json["status"], "pending");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
