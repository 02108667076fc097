// Read-side queries behind GET /api/dashboard.

use chrono::{Duration, NaiveDate};
use sqlx::Row;
use tracing::instrument;

use super::{HeartRepo, format_date, parse_date, parse_timestamp};
use crate::models::{
    CurrentDay, Dashboard, DayValue, IntradaySample, PersonalRecords, SyncStatus, ZoneName,
    ZoneSummary, zone_breakdown,
};

const RECORDS_LIMIT: u32 = 10;

impl HeartRepo {
    /// Full dashboard for `account_id` as of `today`.
    #[instrument(skip(self, status), fields(repo = "heart", operation = "dashboard"))]
    pub async fn dashboard(
        &self,
        account_id: &str,
        today: NaiveDate,
        status: &SyncStatus,
    ) -> anyhow::Result<Dashboard> {
        let heart_rates = self.samples_on(account_id, today).await?;
        let high = heart_rates.iter().max_by_key(|s| s.value).cloned();
        let low = heart_rates.iter().min_by_key(|s| s.value).cloned();
        let today_zones = self.zones_between(account_id, today, today).await?;

        let last7 = self
            .zones_between(account_id, today - Duration::days(7), today)
            .await?;
        let last30 = self
            .zones_between(account_id, today - Duration::days(30), today)
            .await?;

        Ok(Dashboard {
            backfiller_running: status.running,
            backfiller_last_run: status.last_run_started_at,
            current_day: CurrentDay {
                resting: self.resting_on(account_id, today).await?,
                high,
                low,
                zones: zone_breakdown(&today_zones),
                heart_rates,
            },
            last7_days_zones: zone_breakdown(&last7),
            last30_days_zones: zone_breakdown(&last30),
            personal_records: PersonalRecords {
                top10_heart_rates: self.daily_extremes(account_id, true, RECORDS_LIMIT).await?,
                bottom10_heart_rates: self
                    .daily_extremes(account_id, false, RECORDS_LIMIT)
                    .await?,
                max_resting: self.resting_extreme(account_id, true).await?,
                min_resting: self.resting_extreme(account_id, false).await?,
                most_minutes_by_zone: self.most_minutes_by_zone(account_id).await?,
            },
        })
    }

    pub async fn resting_on(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<Option<u32>> {
        let value = sqlx::query_scalar::<_, i64>(
            "SELECT value FROM heart_rest WHERE account_id = $1 AND date = $2",
        )
        .bind(account_id)
        .bind(format_date(date))
        .fetch_optional(&self.pool)
        .await?;
        Ok(value.map(|v| v as u32))
    }

    /// Highest (or lowest) resting rate ever stored.
    pub async fn resting_extreme(
        &self,
        account_id: &str,
        highest: bool,
    ) -> anyhow::Result<Option<DayValue>> {
        let order = if highest { "DESC" } else { "ASC" };
        let row = sqlx::query(&format!(
            "SELECT date, value FROM heart_rest WHERE account_id = $1 ORDER BY value {order}, date DESC LIMIT 1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let date: String = row.try_get("date")?;
        let value: i64 = row.try_get("value")?;
        Ok(Some(DayValue {
            date: parse_date(&date)?,
            value: value as u32,
        }))
    }

    /// Days ranked by their highest (or lowest) intraday sample.
    pub async fn daily_extremes(
        &self,
        account_id: &str,
        highest: bool,
        limit: u32,
    ) -> anyhow::Result<Vec<DayValue>> {
        let (agg, order) = if highest { ("MAX", "DESC") } else { ("MIN", "ASC") };
        let rows = sqlx::query(&format!(
            "SELECT substr(ts, 1, 10) AS day, {agg}(value) AS v
             FROM heart_data WHERE account_id = $1
             GROUP BY day ORDER BY v {order}, day DESC LIMIT $2"
        ))
        .bind(account_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let day: String = row.try_get("day")?;
            let value: i64 = row.try_get("v")?;
            out.push(DayValue {
                date: parse_date(&day)?,
                value: value as u32,
            });
        }
        Ok(out)
    }

    /// Intraday samples for one day, ascending by time.
    pub async fn samples_on(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<IntradaySample>> {
        let (from, to) = super::day_bounds(date);
        let rows = sqlx::query(
            "SELECT ts, value FROM heart_data WHERE account_id = $1 AND ts >= $2 AND ts < $3 ORDER BY ts ASC",
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let ts: String = row.try_get("ts")?;
            let value: i64 = row.try_get("value")?;
            out.push(IntradaySample {
                account_id: account_id.to_string(),
                timestamp: parse_timestamp(&ts)?,
                value: value as u32,
            });
        }
        Ok(out)
    }

    /// Zone rows with `from <= date <= to`, ordered by date then zone.
    pub async fn zones_between(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<ZoneSummary>> {
        let rows = sqlx::query(
            "SELECT date, zone, minutes, calories, min_bpm, max_bpm FROM heart_zone
             WHERE account_id = $1 AND date >= $2 AND date <= $3 ORDER BY date, zone",
        )
        .bind(account_id)
        .bind(format_date(from))
        .bind(format_date(to))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| parse_zone_row(account_id, row))
            .collect()
    }

    /// For each zone, the day with the most minutes in it.
    pub async fn most_minutes_by_zone(&self, account_id: &str) -> anyhow::Result<Vec<ZoneSummary>> {
        let mut out = Vec::with_capacity(ZoneName::ALL.len());
        for zone in ZoneName::ALL {
            let row = sqlx::query(
                "SELECT date, zone, minutes, calories, min_bpm, max_bpm FROM heart_zone
                 WHERE account_id = $1 AND zone = $2 ORDER BY minutes DESC, date DESC LIMIT 1",
            )
            .bind(account_id)
            .bind(zone.as_str())
            .fetch_optional(&self.pool)
            .await?;
            if let Some(row) = row {
                out.push(parse_zone_row(account_id, &row)?);
            }
        }
        Ok(out)
    }
}

fn parse_zone_row(account_id: &str, row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<ZoneSummary> {
    let date: String = row.try_get("date")?;
    let zone: String = row.try_get("zone")?;
    let minutes: i64 = row.try_get("minutes")?;
    let calories: f64 = row.try_get("calories")?;
    let min_bpm: i64 = row.try_get("min_bpm")?;
    let max_bpm: i64 = row.try_get("max_bpm")?;
    Ok(ZoneSummary {
        account_id: account_id.to_string(),
        date: parse_date(&date)?,
        zone: ZoneName::from_vendor(&zone)
            .ok_or_else(|| anyhow::anyhow!("unknown stored zone {:?}", zone))?,
        minutes: minutes as u32,
        calories,
        min_bpm: min_bpm as u32,
        max_bpm: max_bpm as u32,
    })
}
