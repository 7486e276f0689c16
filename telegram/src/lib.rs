//! # EventBooker Telegram
//!
//! Telegram Bot API transport for EventBooker notifications.
//!
//! ## Example
//!
//! ```no_run
//! use eventbooker_telegram::{TelegramClient, TelegramNotifier};
//! use eventbooker_core::notify::Notifier;
//! use eventbooker_core::types::ChatId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create client from TG_TOKEN environment variable
//!     let notifier = TelegramNotifier::new(TelegramClient::from_env()?);
//!
//!     notifier.send_text(ChatId::new(123_456), "Your reservation expired").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `sendMessage` delivery behind the core `Notifier` trait
//! - A log-only notifier for running without a bot
//! - A `/start` listener that tells users their chat id

pub mod client;
pub mod error;
pub mod notifier;
pub mod types;
pub mod updates;

// Re-export main types for convenience
pub use client::TelegramClient;
pub use error::TelegramError;
pub use notifier::{AnyNotifier, LogNotifier, NOTIFICATION_HEADER, TelegramNotifier};
pub use updates::UpdateListener;
