// Backfill driver: owns the date cursor for one account.
// A run tops up forward from the latest stored day to today, then (when a floor date is
// configured) walks backward from the earliest stored day until history runs out.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info};

use crate::error::SyncError;
use crate::fetcher::DaySource;
use crate::heart_repo::HeartStore;
use crate::models::{RunOutcome, SyncState, SyncStatus};
use crate::writer::Writer;

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Floor for the backward walk. `None` disables it.
    pub backfill_start: Option<NaiveDate>,
    pub empty_days_to_stop: u32,
    /// Start the top-up at the latest stored day instead of the one after it.
    pub refetch_latest: bool,
}

pub struct BackfillDriver {
    account_id: String,
    source: Arc<dyn DaySource>,
    writer: Writer,
    store: Arc<dyn HeartStore>,
    config: BackfillConfig,
    status: watch::Sender<SyncStatus>,
}

impl BackfillDriver {
    pub fn new(
        account_id: impl Into<String>,
        source: Arc<dyn DaySource>,
        writer: Writer,
        store: Arc<dyn HeartStore>,
        config: BackfillConfig,
        status: watch::Sender<SyncStatus>,
    ) -> Self {
        let account_id = account_id.into();
        status.send_modify(|s| s.account_id = Some(account_id.clone()));
        Self {
            account_id,
            source,
            writer,
            store,
            config,
            status,
        }
    }

    /// One run against today's UTC date.
    pub async fn run(&self) -> Result<u32, SyncError> {
        self.run_at(Utc::now().date_naive()).await
    }

    /// One run treating `today` as the last fetchable date. Returns days processed.
    pub async fn run_at(&self, today: NaiveDate) -> Result<u32, SyncError> {
        let started_at = Utc::now();
        let started = Instant::now();
        self.status.send_modify(|s| {
            s.state = SyncState::Running;
            s.running = true;
            s.last_run_started_at = Some(started_at);
            s.current_date = None;
        });
        info!(account = %self.account_id, %today, "sync run started");

        let result = self.walk(today).await;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        if let Err(e) = &result
            && e.is_cancelled()
        {
            info!(account = %self.account_id, elapsed_ms, "sync run cancelled");
            self.status.send_modify(|s| {
                s.state = SyncState::Idle;
                s.running = false;
                s.current_date = None;
            });
            return result;
        }

        let failed_date = self.status.borrow().current_date;
        match &result {
            Ok(days) => {
                info!(account = %self.account_id, days, elapsed_ms, "sync run complete");
            }
            Err(e) => {
                error!(
                    account = %self.account_id,
                    date = ?failed_date,
                    elapsed_ms,
                    error = %e,
                    "sync run failed"
                );
            }
        }

        self.status.send_modify(|s| {
            s.running = false;
            s.current_date = None;
            s.last_run_finished_at = Some(Utc::now());
            s.last_run_duration_ms = Some(elapsed_ms);
            match &result {
                Ok(days) => {
                    s.state = SyncState::Complete;
                    s.runs_completed += 1;
                    s.last_outcome = Some(RunOutcome::Complete {
                        days_processed: *days,
                    });
                }
                Err(e) => {
                    s.state = SyncState::Failed;
                    s.runs_failed += 1;
                    s.last_outcome = Some(RunOutcome::Failed {
                        error: e.to_string(),
                        failed_date,
                    });
                }
            }
        });
        self.status.send_modify(|s| s.state = SyncState::Idle);

        result
    }

    async fn walk(&self, today: NaiveDate) -> Result<u32, SyncError> {
        let mut days = self.top_up(today).await?;
        if self.config.backfill_start.is_some() {
            days += self.backfill(today).await?;
        }
        Ok(days)
    }

    /// Forward walk from the day after the latest stored date through `today`.
    /// With `refetch_latest`, a latest day before today is fetched once more.
    pub async fn top_up(&self, today: NaiveDate) -> Result<u32, SyncError> {
        let latest = self.store.latest_date(&self.account_id).await?;
        let mut cursor = match latest {
            Some(latest) if self.config.refetch_latest && latest < today => latest,
            Some(latest) => latest.succ_opt().unwrap_or(latest).min(today),
            None => today,
        };
        if let Some(floor) = self.config.backfill_start {
            cursor = cursor.max(floor);
        }

        let mut days = 0;
        while cursor <= today {
            self.step(cursor).await?;
            days += 1;
            match cursor.succ_opt() {
                Some(next) => cursor = next,
                None => break,
            }
        }
        Ok(days)
    }

    /// Backward walk from the day before the earliest stored date. Stops after
    /// `empty_days_to_stop` consecutive empty days or below the floor.
    pub async fn backfill(&self, today: NaiveDate) -> Result<u32, SyncError> {
        let Some(floor) = self.config.backfill_start else {
            return Ok(0);
        };
        let earliest = self.store.earliest_date(&self.account_id).await?;
        let mut cursor = match earliest {
            Some(earliest) => earliest.pred_opt(),
            None => Some(today),
        };

        let mut days = 0;
        let mut empty_run = 0;
        while let Some(date) = cursor {
            if date < floor {
                info!(account = %self.account_id, %floor, "backfill reached configured start");
                break;
            }
            let empty = self.step(date).await?;
            days += 1;
            if empty {
                empty_run += 1;
                if empty_run >= self.config.empty_days_to_stop {
                    info!(
                        account = %self.account_id,
                        %date,
                        empty_days = empty_run,
                        "backfill found no older data"
                    );
                    break;
                }
            } else {
                empty_run = 0;
            }
            cursor = date.pred_opt();
        }
        Ok(days)
    }

    /// Fetch then persist one date. Returns whether the vendor had nothing for it.
    async fn step(&self, date: NaiveDate) -> Result<bool, SyncError> {
        self.status.send_modify(|s| s.current_date = Some(date));
        let started = Instant::now();
        let payload = self.source.fetch(&self.account_id, date).await?;
        let stats = self.writer.persist(&self.account_id, date, &payload).await?;
        info!(
            account = %self.account_id,
            %date,
            summaries = stats.summaries,
            zones = stats.zones,
            samples = stats.samples,
            rows = stats.total(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "synced day"
        );
        Ok(payload.is_empty())
    }
}
