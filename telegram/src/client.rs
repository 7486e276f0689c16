//! Telegram Bot API client implementation

use crate::error::TelegramError;
use crate::types::{ApiResponse, GetUpdatesRequest, SendMessageRequest, Update};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Public Bot API endpoint
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Per-request timeout for calls that do not long-poll
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram Bot API client
///
/// Clones share one send lock, so `sendMessage` calls from the notification workers and the
/// update listener never overlap. Long polls do not take it.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
    api_url: String,
    send_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Create a new client with the bot token from environment
    ///
    /// # Errors
    ///
    /// Returns `TelegramError::MissingToken` if `TG_TOKEN` is not set or empty
    pub fn from_env() -> Result<Self, TelegramError> {
        let token = std::env::var("TG_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or(TelegramError::MissingToken)?;

        Ok(Self::new(token))
    }

    /// Create a new client with an explicit bot token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            send_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Point the client at another API host, such as a local Bot API server
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send `text` to `chat_id`
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, API refusals, or parsing failures
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let request = SendMessageRequest { chat_id, text };
        let _serialized = self.send_lock.lock().await;
        self.call::<_, IgnoredAny>("sendMessage", &request, REQUEST_TIMEOUT)
            .await
            .map(drop)
    }

    /// Long-poll for updates starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, API refusals, or parsing failures
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>, TelegramError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: vec!["message"],
        };
        self.call("getUpdates", &request, timeout + REQUEST_TIMEOUT).await
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/bot{}/{method}", self.api_url, self.token))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| TelegramError::RequestFailed(e.without_url().to_string()))?;

        let status = response.status();
        let envelope = response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| TelegramError::ResponseParseFailed(e.without_url().to_string()));

        match (status, envelope) {
            (StatusCode::UNAUTHORIZED, _) => Err(TelegramError::Unauthorized),
            (StatusCode::TOO_MANY_REQUESTS, envelope) => Err(TelegramError::RateLimited {
                retry_after: envelope
                    .ok()
                    .and_then(|e| e.parameters)
                    .and_then(|p| p.retry_after),
            }),
            (_, Ok(ApiResponse {
                ok: true,
                result: Some(result),
                ..
            })) => Ok(result),
            (status, Ok(envelope)) => Err(TelegramError::ApiError {
                status: envelope.error_code.unwrap_or_else(|| status.as_u16()),
                description: envelope
                    .description
                    .unwrap_or_else(|| "missing result".to_string()),
            }),
            (status, Err(_)) if !status.is_success() => Err(TelegramError::ApiError {
                status: status.as_u16(),
                description: status.canonical_reason().unwrap_or("unknown").to_string(),
            }),
            (_, Err(e)) => Err(e),
        }
    }
}
