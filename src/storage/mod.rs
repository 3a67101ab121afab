//! Storage abstractions for run results.
//!
//! A run produces two artifacts:
//!
//! ```text
//! {output.dir}/
//! ├── jobs.csv              # cleaned dataset
//! └── scrape_errors.json    # sources that contributed nothing
//! ```

pub mod local;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{JobRecord, SourceError};

pub use local::LocalStorage;

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// Number of records written to the dataset file
    pub record_count: usize,
    /// Number of source errors written to the report
    pub error_count: usize,
    pub dataset_location: PathBuf,
    pub errors_location: PathBuf,
}

/// Body of the source error report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub timestamp: DateTime<Utc>,
    pub errors: Vec<SourceError>,
}

/// Trait for run result storage backends.
#[async_trait]
pub trait RunStorage: Send + Sync {
    /// Persist a cleaned dataset and the source errors of the same run.
    ///
    /// Returns `None` when there was nothing to write.
    async fn write_run(
        &self,
        dataset: &[JobRecord],
        errors: &[SourceError],
        timestamp: DateTime<Utc>,
    ) -> Result<Option<WriteSummary>>;
}
