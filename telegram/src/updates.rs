//! Long-polling listener that tells users their chat id.
//!
//! Users link their account to the bot by sending `/start`; the bot answers with the chat id
//! they then store on their profile. Any other command gets a short refusal.

use crate::client::TelegramClient;
use crate::types::Update;
use eventbooker_runtime::shutdown::ShutdownSignal;
use std::time::Duration;

/// Default long-polling timeout
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Pause after a failed poll
const ERROR_BACKOFF: Duration = Duration::from_secs(3);

/// Answers bot commands until shutdown.
#[derive(Clone, Debug)]
pub struct UpdateListener {
    client: TelegramClient,
    poll_timeout: Duration,
}

impl UpdateListener {
    /// Create a listener using `client`.
    #[must_use]
    pub const fn new(client: TelegramClient) -> Self {
        Self {
            client,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Override the long-polling timeout.
    #[must_use]
    pub const fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Spawn the listener onto the runtime.
    #[must_use]
    pub fn spawn(self, signal: ShutdownSignal) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(signal))
    }

    /// Poll and answer until `signal` fires.
    pub async fn run(self, mut signal: ShutdownSignal) {
        tracing::info!("Telegram update listener started");
        let mut offset = 0;

        loop {
            let updates = tokio::select! {
                () = signal.triggered() => break,
                result = self.client.get_updates(offset, self.poll_timeout) => result,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.answer(&update).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Polling Telegram updates failed");
                    tokio::select! {
                        () = signal.triggered() => break,
                        () = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::info!("Telegram update listener stopped");
    }

    async fn answer(&self, update: &Update) {
        let Some(message) = &update.message else {
            return;
        };
        let Some(command) = message.command() else {
            return;
        };

        let chat_id = message.chat.id;
        let reply = reply_to(command, chat_id);
        tracing::info!(
            chat_id,
            username = message.chat.username.as_deref().unwrap_or(""),
            command,
            "Bot command received"
        );

        if let Err(e) = self.client.send_message(chat_id, &reply).await {
            tracing::error!(chat_id, error = %e, "Replying to bot command failed");
        }
    }
}

fn reply_to(command: &str, chat_id: i64) -> String {
    match command {
        "start" => format!("Your ChatId: {chat_id}"),
        _ => "Unknown command".to_string(),
    }
}
