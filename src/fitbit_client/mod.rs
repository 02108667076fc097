// Fitbit Web API client: heart-rate time series with intraday detail.

mod auth;

pub use auth::{Authenticator, OAuthToken};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::models::{HeartRateResponse, VendorErrorBody};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RATE_LIMIT_RESET: &str = "fitbit-rate-limit-reset";

#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP 429. `retry_after` is the vendor hint, when one was sent.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("fitbit api returned {status}: {message}")]
    Failed { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not authenticated")]
    NotAuthenticated,
}

/// Intraday resolution, spelled the way the API path and config file spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DetailLevel {
    #[serde(rename = "1sec")]
    OneSecond,
    #[serde(rename = "1min")]
    OneMinute,
}

impl DetailLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            DetailLevel::OneSecond => "1sec",
            DetailLevel::OneMinute => "1min",
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One heart-rate request: a date range plus optional intraday detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartRateQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub detail: Option<DetailLevel>,
}

impl HeartRateQuery {
    pub fn day(date: NaiveDate, detail: DetailLevel) -> Self {
        Self {
            start: date,
            end: date,
            detail: Some(detail),
        }
    }

    pub fn path(&self, account_id: &str) -> String {
        let start = self.start.format("%Y-%m-%d");
        let end = self.end.format("%Y-%m-%d");
        match self.detail {
            Some(detail) => format!(
                "/1/user/{account_id}/activities/heart/date/{start}/{end}/{detail}.json"
            ),
            None => format!("/1/user/{account_id}/activities/heart/date/{start}/{end}.json"),
        }
    }
}

/// Source of the bearer token attached to every API call.
#[async_trait]
pub trait AccessToken: Send + Sync {
    async fn bearer(&self) -> Result<String, ApiError>;
}

#[async_trait]
pub trait HeartRateApi: Send + Sync {
    async fn heart_rate(
        &self,
        account_id: &str,
        query: &HeartRateQuery,
    ) -> Result<HeartRateResponse, ApiError>;
}

pub struct FitbitClient {
    http: Client,
    base_url: String,
    token: Arc<dyn AccessToken>,
}

impl FitbitClient {
    pub fn new(base_url: &str, token: Arc<dyn AccessToken>) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl HeartRateApi for FitbitClient {
    #[instrument(skip(self), fields(client = "fitbit", start = %query.start, end = %query.end))]
    async fn heart_rate(
        &self,
        account_id: &str,
        query: &HeartRateQuery,
    ) -> Result<HeartRateResponse, ApiError> {
        let url = format!("{}{}", self.base_url, query.path(account_id));
        let bearer = self.token.bearer().await?;
        let resp = self.http.get(&url).bearer_auth(bearer).send().await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_hint(resp.headers());
            debug!(?retry_after, "rate limited");
            return Err(ApiError::RateLimited { retry_after });
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ApiError::Failed {
                status: status.as_u16(),
                message: vendor_message(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))
    }
}

/// Seconds from `Retry-After`, falling back to Fitbit's own reset header.
pub fn retry_hint(headers: &HeaderMap) -> Option<Duration> {
    [RETRY_AFTER.as_str(), RATE_LIMIT_RESET]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// `errors[].message` joined, or the raw body when it is not the vendor error shape.
fn vendor_message(body: &str) -> String {
    match serde_json::from_str::<VendorErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.message(),
        _ => body.trim().to_string(),
    }
}
