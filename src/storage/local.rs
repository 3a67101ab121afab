//! Local filesystem storage implementation.
//!
//! Both artifacts are written atomically: the content goes to a temporary
//! sibling file which is then renamed over the target, so readers never see
//! a half-written dataset.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{JobRecord, OutputConfig, SourceError};
use crate::storage::{ErrorReport, RunStorage, WriteSummary};

/// Column order of the dataset file.
pub const CSV_HEADER: [&str; 4] = ["company", "vacancy", "apply_link", "scrape_date"];

const SCRAPE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    csv_file: String,
    errors_file: String,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    company: &'a str,
    vacancy: &'a str,
    apply_link: &'a str,
    scrape_date: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory, with the
    /// default file names.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let defaults = OutputConfig::default();
        Self {
            root_dir: root_dir.into(),
            csv_file: defaults.csv_file,
            errors_file: defaults.errors_file,
        }
    }

    /// Create a LocalStorage from the `[output]` section.
    pub fn from_config(config: &OutputConfig) -> Self {
        Self {
            root_dir: PathBuf::from(&config.dir),
            csv_file: config.csv_file.clone(),
            errors_file: config.errors_file.clone(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }
}

/// Render the dataset as RFC 4180 CSV.
pub fn render_csv(dataset: &[JobRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in dataset {
        writer.serialize(CsvRow {
            company: &record.company,
            vacancy: &record.vacancy,
            apply_link: &record.apply_link,
            scrape_date: record.scraped_at.format(SCRAPE_DATE_FORMAT).to_string(),
        })?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

#[async_trait]
impl RunStorage for LocalStorage {
    async fn write_run(
        &self,
        dataset: &[JobRecord],
        errors: &[SourceError],
        timestamp: DateTime<Utc>,
    ) -> Result<Option<WriteSummary>> {
        if dataset.is_empty() && errors.is_empty() {
            log::warn!("No records and no source errors; nothing to write");
            return Ok(None);
        }

        let csv = render_csv(dataset)?;
        let dataset_location = self.write_bytes(&self.csv_file, &csv).await?;
        log::info!(
            "Saved {} jobs to {}",
            dataset.len(),
            dataset_location.display()
        );

        let report = ErrorReport {
            timestamp,
            errors: errors.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&report)?;
        let errors_location = self.write_bytes(&self.errors_file, &json).await?;
        log::info!(
            "Saved {} source errors to {}",
            errors.len(),
            errors_location.display()
        );

        Ok(Some(WriteSummary {
            record_count: dataset.len(),
            error_count: errors.len(),
            dataset_location,
            errors_location,
        }))
    }
}
