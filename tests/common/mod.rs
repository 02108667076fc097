// Shared test helpers
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use fitbit_exporter::error::SyncError;
use fitbit_exporter::fetcher::DaySource;
use fitbit_exporter::fitbit_client::ApiError;
use fitbit_exporter::heart_repo::{HeartRepo, HeartStore};
use fitbit_exporter::models::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const ACCOUNT: &str = "ABC123";

pub const TEST_CONFIG: &str = r#"
[server]
port = 3000
host = "127.0.0.1"

[database]
path = "data/heart.db"
max_pool_size = 2

[fitbit]
client_id = "client"
client_secret = "secret"
backfill_start = "2024-01-01"
"#;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(date: NaiveDate, h: u32, m: u32, s: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(h, m, s).unwrap())
}

/// Fresh SQLite database in a temp dir. Keep the TempDir alive for the test's duration.
pub async fn temp_repo() -> (TempDir, Arc<HeartRepo>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("heart.db");
    let repo = HeartRepo::connect(path.to_str().unwrap(), 2).await.unwrap();
    repo.init().await.unwrap();
    (dir, Arc::new(repo))
}

/// Overview for `date` with all four zones filled in.
pub fn overview(date: NaiveDate, resting: u32) -> DayOverview {
    DayOverview {
        date,
        resting_heart_rate: resting,
        zones: ZoneName::ALL
            .into_iter()
            .enumerate()
            .map(|(i, zone)| ZoneEntry {
                zone,
                minutes: 100 * (4 - i as u32),
                calories: 50.5 * (i as f64 + 1.0),
                min_bpm: 30 + 40 * i as u32,
                max_bpm: 69 + 40 * i as u32,
            })
            .collect(),
    }
}

/// `n` samples one minute apart starting at midnight, all with the same non-zero value.
pub fn minute_samples(n: u32, value: u32) -> Vec<HeartSample> {
    (0..n)
        .map(|i| HeartSample {
            time: NaiveTime::from_hms_opt(i / 60 % 24, i % 60, 0).unwrap(),
            value,
        })
        .collect()
}

/// `n` samples one second apart starting at midnight.
pub fn second_samples(n: u32, value: u32) -> Vec<HeartSample> {
    (0..n)
        .map(|i| HeartSample {
            time: NaiveTime::from_num_seconds_from_midnight_opt(i, 0).unwrap(),
            value,
        })
        .collect()
}

pub fn day_payload(date: NaiveDate, resting: u32, samples: Vec<HeartSample>) -> DayPayload {
    DayPayload {
        overviews: vec![overview(date, resting)],
        samples,
    }
}

/// DaySource answering from a per-date script. Unscripted dates are empty; `fail_on`
/// dates return a vendor error and `cancel_on` dates act as a shutdown mid-fetch.
/// Every call is recorded in order.
#[derive(Default)]
pub struct ScriptedSource {
    pub days: HashMap<NaiveDate, DayPayload>,
    pub fail_on: HashSet<NaiveDate>,
    pub cancel_on: HashSet<NaiveDate>,
    pub calls: Mutex<Vec<NaiveDate>>,
}

impl ScriptedSource {
    pub fn with_days(days: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            days: days
                .into_iter()
                .map(|d| (d, day_payload(d, 60, minute_samples(3, 70))))
                .collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<NaiveDate> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DaySource for ScriptedSource {
    async fn fetch(&self, _account_id: &str, date: NaiveDate) -> Result<DayPayload, SyncError> {
        self.calls.lock().unwrap().push(date);
        if self.cancel_on.contains(&date) {
            return Err(SyncError::Cancelled);
        }
        if self.fail_on.contains(&date) {
            return Err(SyncError::Api(ApiError::Failed {
                status: 500,
                message: "server error".into(),
            }));
        }
        Ok(self.days.get(&date).cloned().unwrap_or_default())
    }
}

/// HeartStore over a real repo that counts timestamp enumerations and batch inserts.
pub struct CountingStore {
    pub inner: Arc<HeartRepo>,
    pub enumerations: AtomicUsize,
    pub batches: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<HeartRepo>) -> Self {
        Self {
            inner,
            enumerations: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
        }
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HeartStore for CountingStore {
    async fn daily_summary_exists(&self, account_id: &str, date: NaiveDate) -> anyhow::Result<bool> {
        self.inner.daily_summary_exists(account_id, date).await
    }

    async fn insert_daily_summary(&self, summary: &DailySummary) -> anyhow::Result<()> {
        self.inner.insert_daily_summary(summary).await
    }

    async fn zone_summary_exists(
        &self,
        account_id: &str,
        date: NaiveDate,
        zone: ZoneName,
    ) -> anyhow::Result<bool> {
        self.inner.zone_summary_exists(account_id, date, zone).await
    }

    async fn insert_zone_summary(&self, zone: &ZoneSummary) -> anyhow::Result<()> {
        self.inner.insert_zone_summary(zone).await
    }

    async fn intraday_timestamps(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<HashSet<NaiveDateTime>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        self.inner.intraday_timestamps(account_id, date).await
    }

    async fn insert_intraday_batch(&self, samples: &[IntradaySample]) -> anyhow::Result<u64> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_intraday_batch(samples).await
    }

    async fn earliest_date(&self, account_id: &str) -> anyhow::Result<Option<NaiveDate>> {
        self.inner.earliest_date(account_id).await
    }

    async fn latest_date(&self, account_id: &str) -> anyhow::Result<Option<NaiveDate>> {
        self.inner.latest_date(account_id).await
    }
}
