// src/pipeline/matcher.rs

//! Keyword routing of records to recipients.

use std::collections::BTreeMap;

use crate::models::{JobRecord, Recipient};

/// Records routed to each recipient address.
pub type Matches = BTreeMap<String, Vec<JobRecord>>;

/// Route records to recipients by case-insensitive substring match on the
/// vacancy title.
///
/// Blank keywords are ignored. Recipients without a match are left out, and a
/// record may be routed to several recipients.
pub fn match_recipients(records: &[JobRecord], recipients: &[Recipient]) -> Matches {
    let mut matches = Matches::new();
    for recipient in recipients {
        let keywords: Vec<String> = recipient
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            continue;
        }

        let matched: Vec<JobRecord> = records
            .iter()
            .filter(|record| {
                let vacancy = record.vacancy.to_lowercase();
                keywords.iter().any(|k| vacancy.contains(k.as_str()))
            })
            .cloned()
            .collect();

        if !matched.is_empty() {
            log::debug!("{}: {} matching records", recipient.address, matched.len());
            matches
                .entry(recipient.address.clone())
                .or_default()
                .extend(matched);
        }
    }
    matches
}
