// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod job;
mod source;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, EmailConfig, HtmlSource, JsonSource, OutputConfig, PageRange,
    Recipient, RetryConfig, SourceConfig, SourceKind,
};
pub use job::{DedupKey, JobRecord, RawJob};
pub use source::{ErrorKind, SourceError};
