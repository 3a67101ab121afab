// src/pipeline/run.rs

use std::sync::Arc;

use crate::error::Result;
use crate::fetch::Fetch;
use crate::models::{JobRecord, Recipient, SourceError};
use crate::notify::{NotificationSink, dispatch};
use crate::sources::SourceRegistry;
use crate::storage::{RunStorage, WriteSummary};
use crate::utils;

use super::clean::clean;
use super::matcher::match_recipients;
use super::orchestrate::Orchestrator;

/// Everything one run needs.
pub struct RunContext<'a> {
    pub registry: &'a SourceRegistry,
    pub fetch: Arc<dyn Fetch>,
    pub deadline: std::time::Duration,
    pub recipients: &'a [Recipient],
    /// Skip persistence when `None`
    pub storage: Option<&'a dyn RunStorage>,
    /// Skip matching and notification when `None`
    pub sink: Option<&'a dyn NotificationSink>,
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub sources: usize,
    pub raw_records: usize,
    pub dataset: Vec<JobRecord>,
    pub errors: Vec<SourceError>,
    pub write: Option<WriteSummary>,
    /// Set when persistence failed; the run carries on without output
    pub store_error: Option<String>,
    pub notified: Vec<String>,
    pub notify_failed: Vec<String>,
}

impl RunSummary {
    pub fn sources_ok(&self) -> usize {
        self.sources - self.errors.len()
    }
}

/// Run the full pipeline: crawl, clean, store, match, notify.
pub async fn run_pipeline(ctx: RunContext<'_>) -> Result<RunSummary> {
    utils::log::header("Job crawler");

    let total_steps = 2 + usize::from(ctx.storage.is_some()) + usize::from(ctx.sink.is_some());
    let mut current_step = 1;

    utils::log::step(
        current_step,
        total_steps,
        &format!("Crawl - Running {} sources", ctx.registry.len()),
    );
    let outcome = Orchestrator::new(Arc::clone(&ctx.fetch), ctx.deadline)
        .run_all(ctx.registry)
        .await;
    current_step += 1;

    utils::log::step(current_step, total_steps, "Clean - Normalizing and deduplicating");
    let raw_records = outcome.records.len();
    let dataset = clean(outcome.records);
    current_step += 1;

    let mut summary = RunSummary {
        sources: outcome.source_count,
        raw_records,
        dataset,
        errors: outcome.errors,
        ..RunSummary::default()
    };

    if let Some(storage) = ctx.storage {
        utils::log::step(current_step, total_steps, "Store - Writing dataset");
        match storage
            .write_run(&summary.dataset, &summary.errors, outcome.scraped_at)
            .await
        {
            Ok(write) => summary.write = write,
            Err(e) => {
                log::error!("Failed to write run output: {}", e);
                summary.store_error = Some(e.to_string());
            }
        }
        current_step += 1;
    }

    if let Some(sink) = ctx.sink {
        utils::log::step(current_step, total_steps, "Notify - Matching recipients");
        if summary.dataset.is_empty() {
            log::warn!("No jobs to send notifications for");
        } else {
            let matches = match_recipients(&summary.dataset, ctx.recipients);
            log::info!(
                "{} of {} recipients have matches",
                matches.len(),
                ctx.recipients.len()
            );
            let dispatched = dispatch(sink, &matches).await;
            summary.notified = dispatched.delivered;
            summary.notify_failed = dispatched.failed;
        }
    }

    utils::log::summary(
        "Run complete",
        &[
            (
                "Sources",
                format!("{} ok, {} failed", summary.sources_ok(), summary.errors.len()),
            ),
            ("Raw records", summary.raw_records.to_string()),
            (
                "Stored",
                match (&summary.write, &summary.store_error) {
                    (Some(write), _) => format!("{} records", write.record_count),
                    (None, Some(_)) => "failed".to_string(),
                    (None, None) => "skipped".to_string(),
                },
            ),
            ("Clean records", summary.dataset.len().to_string()),
            ("Recipients notified", summary.notified.len().to_string()),
        ],
    );

    Ok(summary)
}
