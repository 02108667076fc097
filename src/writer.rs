// Idempotent persistence of one fetched day.
// Summaries and zones are check-then-insert; intraday samples are filtered against one
// enumeration of the day's stored timestamps and inserted in batches.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::SyncError;
use crate::heart_repo::HeartStore;
use crate::models::{DailySummary, DayPayload, IntradaySample, ZoneSummary};

/// Rows inserted by one `persist` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub summaries: u64,
    pub zones: u64,
    pub samples: u64,
}

impl PersistStats {
    pub fn total(&self) -> u64 {
        self.summaries + self.zones + self.samples
    }
}

/// Each sample row binds three parameters; SQLite caps one statement at 32766.
pub const MAX_INSERT_BATCH_SIZE: usize = 10_000;

pub struct Writer {
    store: Arc<dyn HeartStore>,
    batch_size: usize,
}

impl Writer {
    pub fn new(store: Arc<dyn HeartStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.clamp(1, MAX_INSERT_BATCH_SIZE),
        }
    }

    pub async fn persist(
        &self,
        account_id: &str,
        date: NaiveDate,
        payload: &DayPayload,
    ) -> Result<PersistStats, SyncError> {
        let mut stats = PersistStats::default();

        for overview in &payload.overviews {
            if overview.resting_heart_rate != 0
                && !self
                    .store
                    .daily_summary_exists(account_id, overview.date)
                    .await?
            {
                self.store
                    .insert_daily_summary(&DailySummary {
                        account_id: account_id.to_string(),
                        date: overview.date,
                        resting_heart_rate: overview.resting_heart_rate,
                    })
                    .await?;
                stats.summaries += 1;
            }

            for entry in &overview.zones {
                if self
                    .store
                    .zone_summary_exists(account_id, overview.date, entry.zone)
                    .await?
                {
                    continue;
                }
                self.store
                    .insert_zone_summary(&ZoneSummary {
                        account_id: account_id.to_string(),
                        date: overview.date,
                        zone: entry.zone,
                        minutes: entry.minutes,
                        calories: entry.calories,
                        min_bpm: entry.min_bpm,
                        max_bpm: entry.max_bpm,
                    })
                    .await?;
                stats.zones += 1;
            }
        }

        if !payload.samples.is_empty() {
            let stored = self.store.intraday_timestamps(account_id, date).await?;
            let mut seen = HashSet::with_capacity(payload.samples.len());
            let fresh: Vec<IntradaySample> = payload
                .samples
                .iter()
                .filter(|s| s.value != 0)
                .map(|s| IntradaySample {
                    account_id: account_id.to_string(),
                    timestamp: date.and_time(s.time),
                    value: s.value,
                })
                .filter(|s| !stored.contains(&s.timestamp) && seen.insert(s.timestamp))
                .collect();

            for batch in fresh.chunks(self.batch_size) {
                stats.samples += self.store.insert_intraday_batch(batch).await?;
            }
        }

        debug!(
            account = account_id,
            %date,
            summaries = stats.summaries,
            zones = stats.zones,
            samples = stats.samples,
            "persisted day"
        );
        Ok(stats)
    }
}
