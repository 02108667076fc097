// SQLite heart-rate store: resting rate (heart_rest), zones (heart_zone), intraday samples (heart_data).
// Dates are TEXT `YYYY-MM-DD`, timestamps TEXT `YYYY-MM-DD HH:MM:SS`, so lexical order is time order.
// Every query is scoped by account_id.

mod dashboard;
mod store;

pub use store::HeartStore;

use crate::fitbit_client::OAuthToken;
use crate::models::{DailySummary, IntradaySample, ZoneName, ZoneSummary};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Row counts for one account, logged at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub daily_summaries: i64,
    pub zone_summaries: i64,
    pub intraday_samples: i64,
}

pub struct HeartRepo {
    pool: SqlitePool,
}

impl HeartRepo {
    /// Connect to SQLite at `path`, create parent dir and DB if missing, enable WAL + pragmas.
    pub async fn connect(path: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (key TEXT PRIMARY KEY, value INTEGER NOT NULL)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS heart_rest (
                account_id TEXT NOT NULL,
                date TEXT NOT NULL,
                value INTEGER NOT NULL,
                PRIMARY KEY (account_id, date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS heart_zone (
                account_id TEXT NOT NULL,
                date TEXT NOT NULL,
                zone TEXT NOT NULL,
                minutes INTEGER NOT NULL,
                calories REAL NOT NULL,
                min_bpm INTEGER NOT NULL,
                max_bpm INTEGER NOT NULL,
                PRIMARY KEY (account_id, date, zone)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS heart_data (
                account_id TEXT NOT NULL,
                ts TEXT NOT NULL,
                value INTEGER NOT NULL,
                PRIMARY KEY (account_id, ts)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS oauth_token (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                account_id TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                token_type TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO schema_version (key, value) VALUES ('heart', 1)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn daily_summary_exists(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM heart_rest WHERE account_id = $1 AND date = $2",
        )
        .bind(account_id)
        .bind(format_date(date))
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    #[instrument(
        skip(self, summary),
        fields(repo = "heart", operation = "insert_daily_summary", date = %summary.date)
    )]
    pub async fn insert_daily_summary(&self, summary: &DailySummary) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO heart_rest (account_id, date, value) VALUES ($1, $2, $3)")
            .bind(&summary.account_id)
            .bind(format_date(summary.date))
            .bind(summary.resting_heart_rate as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn zone_summary_exists(
        &self,
        account_id: &str,
        date: NaiveDate,
        zone: ZoneName,
    ) -> anyhow::Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM heart_zone WHERE account_id = $1 AND date = $2 AND zone = $3",
        )
        .bind(account_id)
        .bind(format_date(date))
        .bind(zone.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    #[instrument(
        skip(self, zone),
        fields(repo = "heart", operation = "insert_zone_summary", date = %zone.date, zone = zone.zone.as_str())
    )]
    pub async fn insert_zone_summary(&self, zone: &ZoneSummary) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO heart_zone (account_id, date, zone, minutes, calories, min_bpm, max_bpm) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&zone.account_id)
        .bind(format_date(zone.date))
        .bind(zone.zone.as_str())
        .bind(zone.minutes as i64)
        .bind(zone.calories)
        .bind(zone.min_bpm as i64)
        .bind(zone.max_bpm as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Every sample timestamp already stored for `date`, in one query.
    #[instrument(skip(self), fields(repo = "heart", operation = "intraday_timestamps"))]
    pub async fn intraday_timestamps(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<HashSet<NaiveDateTime>> {
        let (from, to) = day_bounds(date);
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT ts FROM heart_data WHERE account_id = $1 AND ts >= $2 AND ts < $3",
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut out = HashSet::with_capacity(rows.len());
        for ts in rows {
            out.insert(parse_timestamp(&ts)?);
        }
        Ok(out)
    }

    /// One multi-row INSERT for the whole slice.
    #[instrument(
        skip(self, samples),
        fields(repo = "heart", operation = "insert_intraday_batch", samples_count = samples.len())
    )]
    pub async fn insert_intraday_batch(&self, samples: &[IntradaySample]) -> anyhow::Result<u64> {
        if samples.is_empty() {
            return Ok(0);
        }
        let mut qb =
            sqlx::QueryBuilder::<sqlx::Sqlite>::new("INSERT INTO heart_data (account_id, ts, value) ");
        qb.push_values(samples, |mut row, s| {
            row.push_bind(s.account_id.as_str())
                .push_bind(s.timestamp.format(TIMESTAMP_FORMAT).to_string())
                .push_bind(s.value as i64);
        });
        let r = qb.build().execute(&self.pool).await?;
        Ok(r.rows_affected())
    }

    /// Earliest date with a resting rate or an intraday sample.
    pub async fn earliest_date(&self, account_id: &str) -> anyhow::Result<Option<NaiveDate>> {
        let row = sqlx::query_scalar::<_, Option<String>>(
            "SELECT MIN(d) FROM (
                SELECT MIN(date) AS d FROM heart_rest WHERE account_id = $1
                UNION ALL
                SELECT MIN(substr(ts, 1, 10)) AS d FROM heart_data WHERE account_id = $1
            )",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        row.as_deref().map(parse_date).transpose()
    }

    /// Latest date with a resting rate or an intraday sample.
    pub async fn latest_date(&self, account_id: &str) -> anyhow::Result<Option<NaiveDate>> {
        let row = sqlx::query_scalar::<_, Option<String>>(
            "SELECT MAX(d) FROM (
                SELECT MAX(date) AS d FROM heart_rest WHERE account_id = $1
                UNION ALL
                SELECT MAX(substr(ts, 1, 10)) AS d FROM heart_data WHERE account_id = $1
            )",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        row.as_deref().map(parse_date).transpose()
    }

    pub async fn counts(&self, account_id: &str) -> anyhow::Result<RecordCounts> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM heart_rest WHERE account_id = $1) AS rest,
                (SELECT COUNT(*) FROM heart_zone WHERE account_id = $1) AS zone,
                (SELECT COUNT(*) FROM heart_data WHERE account_id = $1) AS data",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(RecordCounts {
            daily_summaries: row.try_get("rest")?,
            zone_summaries: row.try_get("zone")?,
            intraday_samples: row.try_get("data")?,
        })
    }

    pub async fn load_token(&self) -> anyhow::Result<Option<OAuthToken>> {
        let row = sqlx::query(
            "SELECT account_id, access_token, refresh_token, token_type, expires_at FROM oauth_token WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let expires_at: i64 = row.try_get("expires_at")?;
        Ok(Some(OAuthToken {
            account_id: row.try_get("account_id")?,
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            token_type: row.try_get("token_type")?,
            expires_at: DateTime::from_timestamp(expires_at, 0)
                .ok_or_else(|| anyhow::anyhow!("oauth_token.expires_at out of range: {}", expires_at))?,
        }))
    }

    /// Replaces the stored token (single row).
    #[instrument(skip(self, token), fields(repo = "heart", operation = "save_token"))]
    pub async fn save_token(&self, token: &OAuthToken) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO oauth_token (id, account_id, access_token, refresh_token, token_type, expires_at)
             VALUES (1, $1, $2, $3, $4, $5)",
        )
        .bind(&token.account_id)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(&token.token_type)
        .bind(token.expires_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid stored date {:?}: {}", s, e))
}

pub(crate) fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid stored timestamp {:?}: {}", s, e))
}

/// Half-open `[date 00:00:00, next day 00:00:00)` as stored text.
fn day_bounds(date: NaiveDate) -> (String, String) {
    let from = format!("{} 00:00:00", format_date(date));
    let to = match date.succ_opt() {
        Some(next) => format!("{} 00:00:00", format_date(next)),
        None => format!("{} 23:59:60", format_date(date)),
    };
    (from, to)
}
