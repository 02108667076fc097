// OAuth 2.0 authorization-code flow against the Fitbit token endpoint.
// The current token is published on a watch channel; the sync worker waits on it.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::{AccessToken, ApiError};
use crate::config::FitbitConfig;
use crate::heart_repo::HeartRepo;

const SCOPES: &str = "profile heartrate";
const REFRESH_SKEW_SECS: i64 = 60;
const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Fitbit user id; used as the account id in every table.
    pub account_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl OAuthToken {
    pub fn expires_within(&self, now: DateTime<Utc>, skew: ChronoDuration) -> bool {
        self.expires_at - now <= skew
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: i64,
    user_id: String,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> OAuthToken {
        OAuthToken {
            account_id: self.user_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_at: now + ChronoDuration::seconds(self.expires_in),
        }
    }
}

pub struct Authenticator {
    config: FitbitConfig,
    http: Client,
    repo: Arc<HeartRepo>,
    token: watch::Sender<Option<OAuthToken>>,
    refresh_lock: Mutex<()>,
}

impl Authenticator {
    /// Builds the authenticator and publishes the stored token, if any.
    pub async fn load(config: FitbitConfig, repo: Arc<HeartRepo>) -> anyhow::Result<Self> {
        let stored = repo.load_token().await?;
        if let Some(ref t) = stored {
            info!(account = %t.account_id, expires_at = %t.expires_at, "loaded stored oauth token");
        }
        let http = Client::builder().timeout(TOKEN_TIMEOUT).build()?;
        let (token, _) = watch::channel(stored);
        Ok(Self {
            config,
            http,
            repo,
            token,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn authorize_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("scope", SCOPES),
            ],
        )?;
        Ok(url)
    }

    pub fn account_id(&self) -> Option<String> {
        self.token.borrow().as_ref().map(|t| t.account_id.clone())
    }

    /// Resolves with the account id once a token is present; `None` if cancelled first.
    pub async fn wait_for_account(&self, cancel: &CancellationToken) -> Option<String> {
        let mut rx = self.token.subscribe();
        let wait = async {
            rx.wait_for(|t| t.is_some())
                .await
                .ok()
                .and_then(|t| t.as_ref().map(|t| t.account_id.clone()))
        };
        tokio::select! {
            account = wait => account,
            _ = cancel.cancelled() => None,
        }
    }

    /// Trades an authorization code for a token, stores it and publishes the account.
    #[instrument(skip(self, code), fields(operation = "exchange_code"))]
    pub async fn exchange_code(&self, code: &str) -> anyhow::Result<OAuthToken> {
        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("client_id", self.config.client_id.as_str()),
            ])
            .await?;
        self.store(token.clone()).await?;
        info!(account = %token.account_id, "oauth login complete");
        Ok(token)
    }

    /// Stores and publishes `token`, replacing the previous one.
    pub async fn store(&self, token: OAuthToken) -> anyhow::Result<()> {
        self.repo.save_token(&token).await?;
        self.token.send_replace(Some(token));
        Ok(())
    }

    async fn refresh(&self, current: &OAuthToken) -> anyhow::Result<OAuthToken> {
        let token = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
            ])
            .await?;
        self.store(token.clone()).await?;
        info!(account = %token.account_id, expires_at = %token.expires_at, "refreshed oauth token");
        Ok(token)
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> anyhow::Result<OAuthToken> {
        let resp = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("token endpoint returned {}: {}", status, body.trim());
        }
        let parsed: TokenResponse = resp.json().await?;
        Ok(parsed.into_token(Utc::now()))
    }
}

#[async_trait]
impl AccessToken for Authenticator {
    async fn bearer(&self) -> Result<String, ApiError> {
        let current = self.token.borrow().clone();
        let Some(current) = current else {
            return Err(ApiError::NotAuthenticated);
        };
        let skew = ChronoDuration::seconds(REFRESH_SKEW_SECS);
        if !current.expires_within(Utc::now(), skew) {
            return Ok(current.access_token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let latest = self.token.borrow().clone().unwrap_or(current);
        if !latest.expires_within(Utc::now(), skew) {
            return Ok(latest.access_token);
        }
        match self.refresh(&latest).await {
            Ok(t) => Ok(t.access_token),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "oauth token refresh failed");
                Err(ApiError::NotAuthenticated)
            }
        }
    }
}
