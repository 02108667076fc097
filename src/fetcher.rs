// Per-date heart-rate fetch with rate-limit waits.
// A 429 sleeps for the vendor hint plus a margin and retries the same date; every other
// failure goes straight back to the caller.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::fitbit_client::{ApiError, DetailLevel, HeartRateApi, HeartRateQuery};
use crate::models::{DayOverview, DayPayload, HeartRateResponse, HeartSample, ZoneEntry, ZoneName};

/// Anything that can produce one day of heart-rate data.
#[async_trait]
pub trait DaySource: Send + Sync {
    async fn fetch(&self, account_id: &str, date: NaiveDate) -> Result<DayPayload, SyncError>;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub detail: DetailLevel,
    /// Added to every rate-limit wait.
    pub margin: Duration,
    /// Bound on one date's fetch-with-retry sequence.
    pub timeout: Duration,
}

pub struct Fetcher {
    api: Arc<dyn HeartRateApi>,
    config: FetcherConfig,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(api: Arc<dyn HeartRateApi>, config: FetcherConfig, cancel: CancellationToken) -> Self {
        Self { api, config, cancel }
    }

    async fn fetch_with_retry(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> Result<DayPayload, SyncError> {
        let query = HeartRateQuery::day(date, self.config.detail);
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            attempt += 1;
            match self.api.heart_rate(account_id, &query).await {
                Ok(resp) => return to_payload(date, resp),
                Err(ApiError::RateLimited { retry_after }) => {
                    let wait = retry_after.unwrap_or_else(|| until_next_hour(Utc::now()))
                        + self.config.margin;
                    warn!(
                        account = account_id,
                        %date,
                        attempt,
                        wait_secs = wait.as_secs(),
                        "rate limited, waiting before retry"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl DaySource for Fetcher {
    async fn fetch(&self, account_id: &str, date: NaiveDate) -> Result<DayPayload, SyncError> {
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.config.timeout,
            self.fetch_with_retry(account_id, date),
        )
        .await;
        match result {
            Ok(payload) => {
                if let Ok(ref p) = payload {
                    debug!(
                        account = account_id,
                        %date,
                        overviews = p.overviews.len(),
                        samples = p.samples.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "fetched day"
                    );
                }
                payload
            }
            Err(_) => Err(SyncError::Timeout {
                date,
                elapsed: started.elapsed(),
            }),
        }
    }
}

/// Time left until the next top of the hour, when Fitbit's hourly quota resets.
pub fn until_next_hour(now: DateTime<Utc>) -> Duration {
    let into_hour = now.minute() as u64 * 60 + now.second() as u64;
    Duration::from_secs(3600 - into_hour)
}

/// Validates the wire response for `date`. Unknown zone names are skipped.
pub fn to_payload(date: NaiveDate, resp: HeartRateResponse) -> Result<DayPayload, SyncError> {
    let mut overviews = Vec::with_capacity(resp.overview.len());
    for entry in resp.overview {
        let day = NaiveDate::parse_from_str(&entry.date_time, "%Y-%m-%d").map_err(|e| {
            SyncError::malformed(date, format!("dateTime {:?}: {}", entry.date_time, e))
        })?;
        let mut zones = Vec::with_capacity(entry.value.heart_rate_zones.len());
        for z in entry.value.heart_rate_zones {
            let Some(zone) = ZoneName::from_vendor(&z.name) else {
                warn!(%date, zone = %z.name, "skipping unknown heart rate zone");
                continue;
            };
            zones.push(ZoneEntry {
                zone,
                minutes: z.minutes,
                calories: z.calories_out,
                min_bpm: z.min,
                max_bpm: z.max,
            });
        }
        overviews.push(DayOverview {
            date: day,
            resting_heart_rate: entry.value.resting_heart_rate,
            zones,
        });
    }

    let dataset = resp.intraday.map(|i| i.dataset).unwrap_or_default();
    let mut samples = Vec::with_capacity(dataset.len());
    for s in dataset {
        let time = NaiveTime::parse_from_str(&s.time, "%H:%M:%S")
            .map_err(|e| SyncError::malformed(date, format!("time {:?}: {}", s.time, e)))?;
        samples.push(HeartSample {
            time,
            value: s.value,
        });
    }

    Ok(DayPayload { overviews, samples })
}
