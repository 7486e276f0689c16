//! Outbound notifications.
//!
//! [`Notifier`] is the messaging transport collaborator: it sends one text to one chat.
//! [`NotificationMessage`] is the in-flight unit the dispatcher queues and retries; it is never
//! persisted.

use crate::types::{ChatId, ExpiredReservation};
use std::future::Future;
use thiserror::Error;

/// Errors raised by a messaging transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The transport could not be reached.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The transport refused the message.
    #[error("Message rejected (status {status}): {reason}")]
    Rejected {
        /// Transport status code
        status: u16,
        /// Transport-provided reason
        reason: String,
    },
}

/// Sends text messages to chats.
///
/// Implementations are not required to tolerate concurrent calls; the dispatcher serializes
/// every call behind one lock.
pub trait Notifier: Send + Sync {
    /// Send `text` to `chat_id`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the message was not delivered.
    fn send_text(&self, chat_id: ChatId, text: &str) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// A message waiting for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationMessage {
    /// Destination chat
    pub chat_id: ChatId,
    /// Body text
    pub text: String,
    /// Failed delivery attempts so far
    pub attempts: u32,
}

impl NotificationMessage {
    /// Create a fresh message with no attempts.
    #[must_use]
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            attempts: 0,
        }
    }

    /// Tell the owner of a lapsed hold that the reservation is gone.
    ///
    /// Returns `None` if the owner has no chat to notify.
    #[must_use]
    pub fn reservation_expired(expired: &ExpiredReservation) -> Option<Self> {
        let chat_id = expired.chat_id?;
        let text = format!(
            "Reservation {} has been cancelled.\nEvent: {}\nEvent date: {}\n",
            expired.reservation_id,
            expired.event_title,
            expired.event_date.format("%Y-%m-%d %H:%M UTC"),
        );
        Some(Self::new(chat_id, text))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::ReservationId;
    use chrono::{DateTime, Utc};

    fn expired(chat_id: Option<ChatId>) -> ExpiredReservation {
        ExpiredReservation {
            reservation_id: ReservationId::new(42),
            chat_id,
            event_title: "Jazz night".to_string(),
            event_date: DateTime::parse_from_rfc3339("2030-05-01T20:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn expiry_message_names_reservation_event_and_date() {
        let message = NotificationMessage::reservation_expired(&expired(Some(ChatId::new(7)))).unwrap();

        assert_eq!(message.chat_id, ChatId::new(7));
        assert_eq!(message.attempts, 0);
        assert!(message.text.contains("Reservation 42"));
        assert!(message.text.contains("Jazz night"));
        assert!(message.text.contains("2030-05-01 20:30 UTC"));
    }

    #[test]
    fn owner_without_chat_gets_no_message() {
        assert!(NotificationMessage::reservation_expired(&expired(None)).is_none());
    }
}
