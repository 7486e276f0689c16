//! Bot API request and response payloads.

use serde::{Deserialize, Serialize};

/// Body of a `sendMessage` call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SendMessageRequest<'a> {
    /// Destination chat
    pub chat_id: i64,
    /// Message text
    pub text: &'a str,
}

/// Body of a `getUpdates` call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GetUpdatesRequest {
    /// First update to return
    pub offset: i64,
    /// Long-polling timeout in seconds
    pub timeout: u64,
    /// Update kinds to receive
    pub allowed_updates: Vec<&'static str>,
}

/// Envelope every Bot API response is wrapped in.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded
    pub ok: bool,
    /// Payload on success
    pub result: Option<T>,
    /// Telegram error code on failure
    pub error_code: Option<u16>,
    /// Human-readable failure reason
    pub description: Option<String>,
    /// Extra failure details
    pub parameters: Option<ResponseParameters>,
}

/// Extra details attached to some failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before retrying after flood control
    pub retry_after: Option<u64>,
}

/// One incoming update.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update identifier
    pub update_id: i64,
    /// New incoming message, if this update carries one
    pub message: Option<IncomingMessage>,
}

/// An incoming chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    /// Chat the message came from
    pub chat: Chat,
    /// Message text, absent for media
    pub text: Option<String>,
}

/// A chat.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Chat identifier
    pub id: i64,
    /// Username for private chats
    pub username: Option<String>,
}

impl IncomingMessage {
    /// The bot command this message starts with, without the slash or a `@botname` suffix.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        let text = self.text.as_deref()?;
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let command = word.split('@').next().unwrap_or(word);
        (!command.is_empty()).then_some(command)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn message(text: Option<&str>) -> IncomingMessage {
        IncomingMessage {
            chat: Chat {
                id: 1,
                username: None,
            },
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn commands_are_extracted() {
        assert_eq!(message(Some("/start")).command(), Some("start"));
        assert_eq!(message(Some("/start@event_booker_bot hi")).command(), Some("start"));
        assert_eq!(message(Some("hello")).command(), None);
        assert_eq!(message(Some("/")).command(), None);
        assert_eq!(message(None).command(), None);
    }

    #[test]
    fn error_envelope_parses() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests","parameters":{"retry_after":7}}"#;
        let parsed: ApiResponse<serde_json::Value> = serde_json::from_str(body).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.error_code, Some(429));
        assert_eq!(parsed.parameters.and_then(|p| p.retry_after), Some(7));
    }
}
