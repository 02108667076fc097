// Storage seam used by the writer and the backfill driver.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;

use super::HeartRepo;
use crate::models::{DailySummary, IntradaySample, ZoneName, ZoneSummary};

/// Existence checks, inserts and cursor bounds for one account's heart-rate rows.
/// Check-then-insert is only safe with a single writer per account.
#[async_trait]
pub trait HeartStore: Send + Sync {
    async fn daily_summary_exists(&self, account_id: &str, date: NaiveDate)
    -> anyhow::Result<bool>;

    async fn insert_daily_summary(&self, summary: &DailySummary) -> anyhow::Result<()>;

    async fn zone_summary_exists(
        &self,
        account_id: &str,
        date: NaiveDate,
        zone: ZoneName,
    ) -> anyhow::Result<bool>;

    async fn insert_zone_summary(&self, zone: &ZoneSummary) -> anyhow::Result<()>;

    async fn intraday_timestamps(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<HashSet<NaiveDateTime>>;

    async fn insert_intraday_batch(&self, samples: &[IntradaySample]) -> anyhow::Result<u64>;

    async fn earliest_date(&self, account_id: &str) -> anyhow::Result<Option<NaiveDate>>;

    async fn latest_date(&self, account_id: &str) -> anyhow::Result<Option<NaiveDate>>;
}

#[async_trait]
impl HeartStore for HeartRepo {
    async fn daily_summary_exists(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<bool> {
        HeartRepo::daily_summary_exists(self, account_id, date).await
    }

    async fn insert_daily_summary(&self, summary: &DailySummary) -> anyhow::Result<()> {
        HeartRepo::insert_daily_summary(self, summary).await
    }

    async fn zone_summary_exists(
        &self,
        account_id: &str,
        date: NaiveDate,
        zone: ZoneName,
    ) -> anyhow::Result<bool> {
        HeartRepo::zone_summary_exists(self, account_id, date, zone).await
    }

    async fn insert_zone_summary(&self, zone: &ZoneSummary) -> anyhow::Result<()> {
        HeartRepo::insert_zone_summary(self, zone).await
    }

    async fn intraday_timestamps(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<HashSet<NaiveDateTime>> {
        HeartRepo::intraday_timestamps(self, account_id, date).await
    }

    async fn insert_intraday_batch(&self, samples: &[IntradaySample]) -> anyhow::Result<u64> {
        HeartRepo::insert_intraday_batch(self, samples).await
    }

    async fn earliest_date(&self, account_id: &str) -> anyhow::Result<Option<NaiveDate>> {
        HeartRepo::earliest_date(self, account_id).await
    }

    async fn latest_date(&self, account_id: &str) -> anyhow::Result<Option<NaiveDate>> {
        HeartRepo::latest_date(self, account_id).await
    }
}
