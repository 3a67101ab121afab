// src/pipeline/clean.rs

//! Normalization and deduplication of crawled records.

use std::collections::HashSet;

use crate::models::JobRecord;

/// Trim, validate and deduplicate records.
///
/// Records without a vacancy or an absolute http(s) link are dropped.
/// Duplicates are detected on the trimmed, case-folded
/// (company, vacancy, link) triple and the first occurrence wins.
/// Cleaning an already clean dataset returns it unchanged.
pub fn clean(records: Vec<JobRecord>) -> Vec<JobRecord> {
    let total = records.len();
    let mut seen = HashSet::new();
    let cleaned: Vec<JobRecord> = records
        .into_iter()
        .map(trim_record)
        .filter(is_valid)
        .filter(|record| seen.insert(record.dedup_key()))
        .collect();

    if cleaned.len() != total {
        log::debug!(
            "Cleaning dropped {} of {} records",
            total - cleaned.len(),
            total
        );
    }
    cleaned
}

fn trim_record(mut record: JobRecord) -> JobRecord {
    record.company = record.company.trim().to_string();
    record.vacancy = record.vacancy.trim().to_string();
    record.apply_link = record.apply_link.trim().to_string();
    record
}

fn is_valid(record: &JobRecord) -> bool {
    !record.vacancy.is_empty()
        && (record.apply_link.starts_with("http://") || record.apply_link.starts_with("https://"))
}
