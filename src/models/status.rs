// Sync status published by the backfill driver and read by the dashboard.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    #[default]
    Idle,
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RunOutcome {
    #[serde(rename_all = "camelCase")]
    Complete { days_processed: u32 },
    #[serde(rename_all = "camelCase")]
    Failed {
        error: String,
        failed_date: Option<NaiveDate>,
    },
}

/// Snapshot of one account's sync worker. Written only by the driver (watch channel).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub account_id: Option<String>,
    pub state: SyncState,
    pub running: bool,
    pub last_run_started_at: Option<DateTime<Utc>>,
    pub last_run_finished_at: Option<DateTime<Utc>>,
    pub last_run_duration_ms: Option<u64>,
    pub last_outcome: Option<RunOutcome>,
    /// Date being fetched/persisted while running.
    pub current_date: Option<NaiveDate>,
    pub runs_completed: u64,
    pub runs_failed: u64,
}
