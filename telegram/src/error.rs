//! Error types for the Telegram Bot API client

use eventbooker_core::notify::NotifyError;
use thiserror::Error;

/// Errors that can occur when talking to the Telegram Bot API
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Missing `TG_TOKEN` environment variable
    #[error("Missing TG_TOKEN environment variable")]
    MissingToken,

    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Response body could not be parsed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// Rate limited - too many requests
    #[error("Rate limited, retry after {retry_after:?}s")]
    RateLimited {
        /// Seconds the API asked us to wait, if given
        retry_after: Option<u64>,
    },

    /// Unauthorized - invalid bot token
    #[error("Unauthorized - invalid bot token")]
    Unauthorized,

    /// API refused the call
    #[error("API error (status {status}): {description}")]
    ApiError {
        /// HTTP status or Telegram error code
        status: u16,
        /// Description returned by the API
        description: String,
    },
}

impl From<TelegramError> for NotifyError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::RequestFailed(reason) => Self::Unavailable(reason),
            TelegramError::RateLimited { .. } => Self::Rejected {
                status: 429,
                reason: err.to_string(),
            },
            TelegramError::Unauthorized => Self::Rejected {
                status: 401,
                reason: err.to_string(),
            },
            TelegramError::ApiError { status, description } => Self::Rejected {
                status,
                reason: description,
            },
            TelegramError::MissingToken | TelegramError::ResponseParseFailed(_) => {
                Self::Unavailable(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_become_rejections() {
        let err = NotifyError::from(TelegramError::ApiError {
            status: 400,
            description: "Bad Request: chat not found".to_string(),
        });
        assert_eq!(
            err,
            NotifyError::Rejected {
                status: 400,
                reason: "Bad Request: chat not found".to_string()
            }
        );
    }

    #[test]
    fn network_errors_become_unavailable() {
        let err = NotifyError::from(TelegramError::RequestFailed("connection refused".into()));
        assert!(matches!(err, NotifyError::Unavailable(_)));
    }
}
