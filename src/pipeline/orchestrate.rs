// src/pipeline/orchestrate.rs

//! Concurrent execution of every registered source.
//!
//! Each adapter runs in its own task. A failing, panicking or hanging
//! adapter only costs its own records; the run as a whole always yields a
//! [`CrawlOutcome`].

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, timeout_at};

use crate::fetch::Fetch;
use crate::models::{ErrorKind, JobRecord, SourceError};
use crate::sources::{SourceRegistry, SourceResult};

/// Result of running every source once.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Tagged records, grouped by source in registration order
    pub records: Vec<JobRecord>,
    /// One entry per source that contributed nothing
    pub errors: Vec<SourceError>,
    /// Timestamp shared by every record of the run
    pub scraped_at: DateTime<Utc>,
    /// Number of sources that were run
    pub source_count: usize,
}

impl CrawlOutcome {
    pub fn succeeded(&self) -> usize {
        self.source_count - self.errors.len()
    }
}

/// Runs all adapters concurrently under one deadline.
pub struct Orchestrator {
    fetch: Arc<dyn Fetch>,
    deadline: Duration,
}

impl Orchestrator {
    pub fn new(fetch: Arc<dyn Fetch>, deadline: Duration) -> Self {
        Self { fetch, deadline }
    }

    /// Run every registered source and collect their records.
    ///
    /// Sources still running when the deadline passes are aborted and
    /// reported as `timeout`.
    pub async fn run_all(&self, registry: &SourceRegistry) -> CrawlOutcome {
        let deadline = Instant::now() + self.deadline;

        let handles: Vec<(String, JoinHandle<SourceResult>)> = registry
            .iter()
            .map(|source| {
                let adapter = Arc::clone(&source.adapter);
                let fetch = Arc::clone(&self.fetch);
                let handle = tokio::spawn(async move { adapter.run(fetch.as_ref()).await });
                (source.name.clone(), handle)
            })
            .collect();
        log::info!("Started {} sources", handles.len());

        let mut results = Vec::with_capacity(handles.len());
        for (name, mut handle) in handles {
            let result = match timeout_at(deadline, &mut handle).await {
                Ok(Ok(Ok(jobs))) => Ok(jobs),
                Ok(Ok(Err(error))) => Err(SourceError::new(&name, error.kind(), error.to_string())),
                Ok(Err(join_error)) => Err(from_join_error(&name, join_error)),
                Err(_) => {
                    handle.abort();
                    Err(SourceError::new(
                        &name,
                        ErrorKind::Timeout,
                        format!("did not finish within {}s", self.deadline.as_secs_f64()),
                    ))
                }
            };
            results.push((name, result));
        }

        let scraped_at = Utc::now();
        let mut outcome = CrawlOutcome {
            records: Vec::new(),
            errors: Vec::new(),
            scraped_at,
            source_count: results.len(),
        };
        for (name, result) in results {
            match result {
                Ok(jobs) => {
                    log::info!("{name}: {} listings", jobs.len());
                    outcome
                        .records
                        .extend(jobs.into_iter().map(|job| job.into_record(&name, scraped_at)));
                }
                Err(error) => {
                    log::error!("{error}");
                    outcome.errors.push(error);
                }
            }
        }
        outcome
    }
}

fn from_join_error(name: &str, error: JoinError) -> SourceError {
    let message = if error.is_panic() {
        format!("panicked: {}", panic_message(error.into_panic()))
    } else {
        "task was cancelled".to_string()
    };
    SourceError::new(name, ErrorKind::Unexpected, message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
