// Errors surfaced by the fetcher, writer and backfill driver.

use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

use crate::fitbit_client::ApiError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Vendor call failed for a reason other than rate limiting.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("malformed payload for {date}: {reason}")]
    Malformed { date: NaiveDate, reason: String },

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("gave up fetching {date} after {elapsed:?} of rate limiting")]
    Timeout { date: NaiveDate, elapsed: Duration },

    #[error("cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn malformed(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self::Malformed {
            date,
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}
