// src/error.rs

//! Unified error handling for the crawler application.
//!
//! Process-level failures use [`AppError`]. Per-request and per-source
//! failures ([`FetchError`], [`AdapterError`]) never abort a run; the
//! orchestrator turns them into [`SourceError`](crate::models::SourceError)
//! values.

use std::fmt;

use thiserror::Error;

use crate::models::ErrorKind;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV serialization failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Notification transport could not be set up
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Failure of a single fetch call, after retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Body could not be decoded with any fallback encoding
    #[error("could not decode response body from {url}")]
    Decode { url: String },

    /// Server kept answering with a non-200 status
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    /// Connection could not be established or was dropped
    #[error("connection error for {url}: {message}")]
    Connection { url: String, message: String },

    /// Request exceeded its timeout budget
    #[error("timeout for {url}")]
    Timeout { url: String },

    /// Request could not be built (bad URL, bad header)
    #[error("invalid request for {url}: {message}")]
    Request { url: String, message: String },
}

impl FetchError {
    /// Map the failure onto the source error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Http { status, .. } => ErrorKind::Http(*status),
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Request { .. } => ErrorKind::Unexpected,
        }
    }

    /// Classify a transport-level reqwest error.
    pub(crate) fn from_transport(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if error.is_builder() {
            Self::Request {
                url: url.to_string(),
                message: error.to_string(),
            }
        } else {
            Self::Connection {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

/// Failure of one source adapter run.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// A fetch failed after the fetcher's own retries
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Markup or JSON did not have the expected shape
    #[error("parse error: {0}")]
    Parse(String),

    /// Anything else
    #[error("{0}")]
    Unexpected(String),
}

impl AdapterError {
    /// Create a parse error.
    pub fn parse(message: impl fmt::Display) -> Self {
        Self::Parse(message.to_string())
    }

    /// Create an invalid CSS selector error.
    pub fn selector(selector: &str, message: impl fmt::Debug) -> Self {
        Self::Parse(format!("invalid selector '{selector}': {message:?}"))
    }

    /// Map the failure onto the source error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(e) => e.kind(),
            Self::Parse(_) => ErrorKind::Parse,
            Self::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

/// Failure to deliver one notification.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Sink is missing credentials or has a bad address
    #[error("notification setup failed: {0}")]
    Setup(String),

    /// Message could not be built
    #[error("failed to build message for {address}: {message}")]
    Build { address: String, message: String },

    /// Transport rejected the message
    #[error("failed to deliver to {address}: {message}")]
    Send { address: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_kinds() {
        let http = FetchError::Http {
            url: "https://x".into(),
            status: 500,
        };
        assert_eq!(http.kind(), ErrorKind::Http(500));

        let timeout = FetchError::Timeout {
            url: "https://x".into(),
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn adapter_error_kind_follows_fetch_error() {
        let err: AdapterError = FetchError::Decode {
            url: "https://x".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(AdapterError::parse("bad").kind(), ErrorKind::Parse);
    }
}
