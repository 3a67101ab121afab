//! Per-source failure reporting.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status")]
pub enum ErrorKind {
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "http_error")]
    Http(u16),
    #[serde(rename = "connection_error")]
    Connection,
    #[serde(rename = "decode_error")]
    Decode,
    #[serde(rename = "parse_error")]
    Parse,
    #[serde(rename = "unexpected_error")]
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Http(status) => write!(f, "http_error({status})"),
            Self::Connection => f.write_str("connection_error"),
            Self::Decode => f.write_str("decode_error"),
            Self::Parse => f.write_str("parse_error"),
            Self::Unexpected => f.write_str("unexpected_error"),
        }
    }
}

/// A source that contributed no records to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    /// Adapter name
    pub name: String,

    #[serde(flatten)]
    pub kind: ErrorKind,

    /// Human-readable cause
    pub message: String,
}

impl SourceError {
    pub fn new(name: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.name, self.kind, self.message)
    }
}
