//! [`Notifier`] implementations for the bot and for running without one.

use crate::client::TelegramClient;
use eventbooker_core::notify::{Notifier, NotifyError};
use eventbooker_core::types::ChatId;

/// First line of every message the bot sends.
pub const NOTIFICATION_HEADER: &str = "New notification!";

/// Delivers notifications through the Telegram Bot API.
#[derive(Clone, Debug)]
pub struct TelegramNotifier {
    client: TelegramClient,
}

impl TelegramNotifier {
    /// Wrap a configured client.
    #[must_use]
    pub const fn new(client: TelegramClient) -> Self {
        Self { client }
    }

    /// The underlying client.
    #[must_use]
    pub const fn client(&self) -> &TelegramClient {
        &self.client
    }
}

impl Notifier for TelegramNotifier {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), NotifyError> {
        let body = format!("{NOTIFICATION_HEADER}\n{text}");
        self.client
            .send_message(chat_id.get(), &body)
            .await
            .map_err(|e| {
                tracing::error!(chat_id = %chat_id, error = %e, "Telegram sendMessage failed");
                NotifyError::from(e)
            })
    }
}

/// Writes notifications to the log and reports success.
///
/// Used when no bot token is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), NotifyError> {
        tracing::info!(chat_id = %chat_id, text, "Notification (no bot configured)");
        Ok(())
    }
}

/// Either transport, picked at startup.
#[derive(Clone, Debug)]
pub enum AnyNotifier {
    /// Deliver through the bot
    Telegram(TelegramNotifier),
    /// Log only
    Log(LogNotifier),
}

impl Notifier for AnyNotifier {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), NotifyError> {
        match self {
            Self::Telegram(notifier) => notifier.send_text(chat_id, text).await,
            Self::Log(notifier) => notifier.send_text(chat_id, text).await,
        }
    }
}
