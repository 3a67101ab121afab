//! Job listing data structures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A listing as emitted by a source adapter, before provenance is attached.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawJob {
    /// Hiring company (may be empty when the source does not expose it)
    pub company: String,

    /// Listing title
    pub vacancy: String,

    /// Link to the listing or application form
    pub apply_link: String,

    /// Source specific fields (location, deadline, ...)
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl RawJob {
    pub fn new(
        company: impl Into<String>,
        vacancy: impl Into<String>,
        apply_link: impl Into<String>,
    ) -> Self {
        Self {
            company: company.into(),
            vacancy: vacancy.into(),
            apply_link: apply_link.into(),
            extras: BTreeMap::new(),
        }
    }

    /// Attach an extra field.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Tag the listing with the source that produced it and the run timestamp.
    pub fn into_record(self, source: &str, scraped_at: DateTime<Utc>) -> JobRecord {
        JobRecord {
            company: self.company,
            vacancy: self.vacancy,
            apply_link: self.apply_link,
            source: source.to_string(),
            scraped_at,
            extras: self.extras,
        }
    }
}

/// One normalized job listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRecord {
    /// Hiring company
    pub company: String,

    /// Listing title
    pub vacancy: String,

    /// Absolute http(s) link once cleaned
    pub apply_link: String,

    /// Name of the adapter that produced the record
    pub source: String,

    /// Run timestamp shared by every record of a run
    pub scraped_at: DateTime<Utc>,

    /// Source specific fields
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

/// Comparison key used for deduplication.
///
/// Fields are trimmed and case-folded; the record itself keeps its display case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    company: String,
    vacancy: String,
    apply_link: String,
}

impl JobRecord {
    /// Key identifying the same listing across sources.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            company: fold(&self.company),
            vacancy: fold(&self.vacancy),
            apply_link: fold(&self.apply_link),
        }
    }

    /// Format the record for display using a template.
    ///
    /// Supported placeholders: `{company}`, `{vacancy}`, `{link}`, `{source}`.
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{company}", &self.company)
            .replace("{vacancy}", &self.vacancy)
            .replace("{link}", &self.apply_link)
            .replace("{source}", &self.source)
    }
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}
