//! Capacity gate: the admission rule for new reservations.
//!
//! Pure and deterministic. Given an event, its current occupancy and the current time, it either
//! rejects the booking or says which status the new reservation starts in. Keeping it free of I/O
//! lets the rule be tested exhaustively without a store.

use crate::error::BookingError;
use crate::types::{Event, ReservationStatus};
use chrono::{DateTime, Utc};

/// Outcome of a successful admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Seat is held until `expires_at` and must be confirmed before then.
    Pending {
        /// End of the hold
        expires_at: DateTime<Utc>,
    },
    /// Seat is taken immediately.
    Confirmed,
}

impl Admission {
    /// Initial reservation status.
    #[must_use]
    pub const fn status(&self) -> ReservationStatus {
        match self {
            Self::Pending { .. } => ReservationStatus::Pending,
            Self::Confirmed => ReservationStatus::Confirmed,
        }
    }

    /// Hold expiry, present only for pending admissions.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Pending { expires_at } => Some(*expires_at),
            Self::Confirmed => None,
        }
    }
}

/// Decide whether one more reservation fits.
///
/// # Errors
///
/// - [`BookingError::EventAlreadyPassed`] if the event is not strictly in the future
/// - [`BookingError::NoSeatsAvailable`] if `occupied >= event.total_place`
/// - [`BookingError::InvalidHoldDuration`] if `now + event.reservation_period` overflows
pub fn admit(event: &Event, occupied: i64, now: DateTime<Utc>) -> Result<Admission, BookingError> {
    if event.event_date <= now {
        return Err(BookingError::EventAlreadyPassed);
    }

    if occupied >= i64::from(event.total_place) {
        return Err(BookingError::NoSeatsAvailable);
    }

    if event.requires_confirmation {
        let expires_at = now
            .checked_add_signed(event.reservation_period)
            .ok_or(BookingError::InvalidHoldDuration)?;
        Ok(Admission::Pending { expires_at })
    } else {
        Ok(Admission::Confirmed)
    }
}
