//! Delivery of matched records to recipients.
//!
//! - `EmailSink`: HTML email over SMTP (feature `email`)
//! - `LogSink`: writes what would be sent to the log (dry runs)

#[cfg(feature = "email")]
pub mod email;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::models::JobRecord;
use crate::pipeline::Matches;

#[cfg(feature = "email")]
pub use email::EmailSink;

/// A channel that can deliver a recipient's matches.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver the records matched for one recipient.
    async fn deliver(&self, address: &str, records: &[JobRecord]) -> Result<(), NotifyError>;
}

/// Outcome of [`dispatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

/// Deliver every recipient's matches once, in address order.
///
/// A failed delivery is logged and does not stop the others. Nothing is
/// retried.
pub async fn dispatch(sink: &dyn NotificationSink, matches: &Matches) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    for (address, records) in matches {
        match sink.deliver(address, records).await {
            Ok(()) => {
                log::info!("Notification sent to {address} ({} jobs)", records.len());
                summary.delivered.push(address.clone());
            }
            Err(e) => {
                log::error!("Notification to {address} failed: {e}");
                summary.failed.push(address.clone());
            }
        }
    }
    summary
}

/// Subject line for a notification with `count` records.
pub fn subject(count: usize) -> String {
    format!("New Job Matches Found - {count} positions")
}

/// Sink that only logs what it would send.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, address: &str, records: &[JobRecord]) -> Result<(), NotifyError> {
        log::info!("[dry run] {address}: {}", subject(records.len()));
        for record in records {
            log::info!("[dry run]     {}", record.format("{company} | {vacancy} | {link}"));
        }
        Ok(())
    }
}
