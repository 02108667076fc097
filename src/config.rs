use chrono::NaiveDate;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::fitbit_client::DetailLevel;
use crate::writer::MAX_INSERT_BATCH_SIZE;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub fitbit: FitbitConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
}

fn default_max_pool_size() -> u32 {
    5
}

/// Fitbit application credentials and endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct FitbitConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Earliest date the historical backfill may reach. Unset = incremental only.
    #[serde(default)]
    pub backfill_start: Option<NaiveDate>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
    /// Intraday resolution: "1min" or "1sec".
    #[serde(default = "default_detail_level")]
    pub detail_level: DetailLevel,
}

fn default_api_base_url() -> String {
    "https://api.fitbit.com".into()
}

fn default_authorize_url() -> String {
    "https://www.fitbit.com/oauth2/authorize".into()
}

fn default_token_url() -> String {
    "https://api.fitbit.com/oauth2/token".into()
}

fn default_redirect_url() -> String {
    "http://localhost:3000/callback".into()
}

fn default_detail_level() -> DetailLevel {
    DetailLevel::OneMinute
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Fixed interval between sync runs when `schedule` is not set.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Optional cron expression for sync runs (e.g. "0 5 * * * *" = five past every hour). Uses local time.
    #[serde(default)]
    pub schedule: Option<String>,
    /// Added on top of the vendor's retry-after hint.
    #[serde(default = "default_rate_limit_margin_secs")]
    pub rate_limit_margin_secs: u64,
    /// Upper bound on one date's fetch-with-retry sequence.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Consecutive empty days after which the backward walk assumes history is exhausted.
    #[serde(default = "default_empty_days_to_stop")]
    pub empty_days_to_stop: u32,
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
    /// Fetch the latest stored day once more on the next top-up, for its late resting rate and tail.
    #[serde(default)]
    pub refetch_latest: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            schedule: None,
            rate_limit_margin_secs: default_rate_limit_margin_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            empty_days_to_stop: default_empty_days_to_stop(),
            insert_batch_size: default_insert_batch_size(),
            refetch_latest: false,
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_rate_limit_margin_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    3 * 3600
}

fn default_empty_days_to_stop() -> u32 {
    2
}

fn default_insert_batch_size() -> usize {
    200
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn rate_limit_margin(&self) -> Duration {
        Duration::from_secs(self.rate_limit_margin_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            !self.fitbit.client_id.trim().is_empty(),
            "fitbit.client_id must be non-empty"
        );
        anyhow::ensure!(
            !self.fitbit.client_secret.trim().is_empty(),
            "fitbit.client_secret must be non-empty"
        );
        for (key, url) in [
            ("fitbit.api_base_url", &self.fitbit.api_base_url),
            ("fitbit.authorize_url", &self.fitbit.authorize_url),
            ("fitbit.token_url", &self.fitbit.token_url),
            ("fitbit.redirect_url", &self.fitbit.redirect_url),
        ] {
            anyhow::ensure!(
                reqwest::Url::parse(url).is_ok(),
                "{} must be an absolute URL, got {:?}",
                key,
                url
            );
        }
        anyhow::ensure!(
            self.sync.interval_secs > 0,
            "sync.interval_secs must be > 0, got {}",
            self.sync.interval_secs
        );
        if let Some(ref schedule) = self.sync.schedule {
            anyhow::ensure!(
                cron::Schedule::from_str(schedule).is_ok(),
                "sync.schedule is not a valid cron expression: {:?}",
                schedule
            );
        }
        anyhow::ensure!(
            self.sync.fetch_timeout_secs > 0,
            "sync.fetch_timeout_secs must be > 0, got {}",
            self.sync.fetch_timeout_secs
        );
        anyhow::ensure!(
            self.sync.empty_days_to_stop > 0,
            "sync.empty_days_to_stop must be > 0, got {}",
            self.sync.empty_days_to_stop
        );
        anyhow::ensure!(
            self.sync.insert_batch_size > 0,
            "sync.insert_batch_size must be > 0, got {}",
            self.sync.insert_batch_size
        );
        anyhow::ensure!(
            self.sync.insert_batch_size <= MAX_INSERT_BATCH_SIZE,
            "sync.insert_batch_size must be <= {}, got {}",
            MAX_INSERT_BATCH_SIZE,
            self.sync.insert_batch_size
        );
        Ok(())
    }
}
