//! Pipeline stages for a crawl run.
//!
//! - `orchestrate`: run every source concurrently under one deadline
//! - `clean`: normalize and deduplicate records
//! - `matcher`: route records to recipients by keyword
//! - `run`: chain the stages with storage and notification

pub mod clean;
pub mod matcher;
pub mod orchestrate;
pub mod run;

pub use clean::clean;
pub use matcher::{Matches, match_recipients};
pub use orchestrate::{CrawlOutcome, Orchestrator};
pub use run::{RunContext, RunSummary, run_pipeline};
