use crate::bingx::types::ApiError;
use thiserror::Error;

/// Main error type for the BingX connector
///
/// Session-level variants (`Connect`, `Transport`, `Decode`) describe the
/// physical connection. `Parse` is raised per message and never tears a
/// session down on its own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BingxError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BingxError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BingxError::Connect(_) | BingxError::Transport(_) | BingxError::RateLimit(_)
        )
    }

    /// Whether the error ends a streaming session
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            BingxError::Connect(_) | BingxError::Transport(_) | BingxError::Decode(_)
        )
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            BingxError::Connect(_) => "connect_error",
            BingxError::Transport(_) => "transport_error",
            BingxError::Decode(_) => "decode_error",
            BingxError::Parse(_) => "parse_error",
            BingxError::Api(_) => "api_error",
            BingxError::RateLimit(_) => "rate_limit",
            BingxError::InvalidRequest(_) => "invalid_request",
            BingxError::Internal(_) => "internal_error",
        }
    }
}

impl From<reqwest::Error> for BingxError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BingxError::Connect(
                "Request timeout. Please check your internet connection.".to_string(),
            )
        } else if err.is_connect() {
            BingxError::Connect(
                "Failed to connect to BingX API. Please check your internet connection."
                    .to_string(),
            )
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                429 => BingxError::RateLimit(
                    "Too many requests to BingX API. Slow down before retrying.".to_string(),
                ),
                500..=599 => BingxError::Connect(format!(
                    "BingX server error (HTTP {}). Please try again later.",
                    status.as_u16()
                )),
                _ => BingxError::Internal(format!("HTTP error: {}", status)),
            }
        } else {
            BingxError::Internal(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BingxError {
    fn from(err: serde_json::Error) -> Self {
        BingxError::Parse(format!("JSON parsing failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, BingxError>;
