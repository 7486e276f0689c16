//! Error types for the booking engine.
//!
//! Errors fall into two families that callers must be able to tell apart:
//!
//! - **Domain-rule violations** (`EventNotFound`, `NoSeatsAvailable`, ...): expected outcomes,
//!   returned verbatim, never retried and never logged as faults.
//! - **Infrastructure failures** ([`StoreError`]): the storage collaborator could not do its
//!   job. The caller-facing layer maps these to a server error.
//!
//! Delivery failures of the messaging transport never appear here; they stay inside the
//! notification dispatcher.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by the storage collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The database could not be reached or a statement failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Beginning, committing or rolling back a transaction failed.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A stored row could not be mapped to a domain type.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Errors returned by the reservation workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// The referenced event does not exist.
    #[error("event not found")]
    EventNotFound,

    /// The event's scheduled time is not in the future.
    #[error("event already passed")]
    EventAlreadyPassed,

    /// Every seat is held or confirmed.
    #[error("no seats available")]
    NoSeatsAvailable,

    /// No reservation matches the (reservation, event, user) triple in a state that allows
    /// the requested change.
    #[error("booking not found")]
    BookingNotFound,

    /// The event does not use confirmation, so there is nothing to confirm.
    #[error("booking not required")]
    BookingNotRequired,

    /// The event's reservation period pushes the hold expiry past the representable range.
    #[error("reservation period out of range")]
    InvalidHoldDuration,

    /// Infrastructure failure.
    #[error("storage unavailable: {0}")]
    Storage(#[from] StoreError),
}

impl BookingError {
    /// Whether this is a business-rule outcome rather than a system failure.
    #[must_use]
    pub const fn is_domain(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

/// Errors returned by the event catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The referenced event does not exist.
    #[error("event not found")]
    EventNotFound,

    /// The title is empty or blank.
    #[error("event title cannot be empty")]
    EmptyTitle,

    /// The event date is not in the future.
    #[error("invalid event date")]
    InvalidEventDate,

    /// The capacity is not positive.
    #[error("total places must be positive")]
    InvalidTotalPlace,

    /// The hold duration is not positive or outlasts the time left until the event.
    #[error("reservation period must be positive and end before the event")]
    InvalidHoldDuration,

    /// Infrastructure failure.
    #[error("storage unavailable: {0}")]
    Storage(#[from] StoreError),
}

impl CatalogError {
    /// Whether this is a validation or lookup outcome rather than a system failure.
    #[must_use]
    pub const fn is_domain(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}
