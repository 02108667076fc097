// Sync scheduler: waits for OAuth login, runs the backfill driver once, then again on
// a fixed interval or cron schedule until cancelled. Runs never overlap.

use chrono::{DateTime, Local};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backfill::{BackfillConfig, BackfillDriver};
use crate::config::AppConfig;
use crate::fetcher::{Fetcher, FetcherConfig};
use crate::fitbit_client::{AccessToken, Authenticator, FitbitClient};
use crate::heart_repo::HeartRepo;
use crate::models::SyncStatus;
use crate::writer::Writer;

/// When the next run starts, measured from the end of the previous one.
pub enum RunSchedule {
    Interval(Duration),
    /// Local time, like the rest of the scheduled jobs.
    Cron(Box<cron::Schedule>),
}

impl RunSchedule {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        match config.sync.schedule {
            Some(ref expr) => {
                let schedule = cron::Schedule::from_str(expr)
                    .map_err(|e| anyhow::anyhow!("sync.schedule {:?}: {}", expr, e))?;
                Ok(RunSchedule::Cron(Box::new(schedule)))
            }
            None => Ok(RunSchedule::Interval(config.sync.interval())),
        }
    }

    pub fn next_delay(&self, now: DateTime<Local>) -> Duration {
        match self {
            RunSchedule::Interval(d) => *d,
            RunSchedule::Cron(schedule) => match schedule.after(&now).next() {
                Some(next) => (next - now).to_std().unwrap_or(Duration::from_secs(1)),
                None => Duration::from_secs(3600),
            },
        }
    }
}

pub struct SyncWorkerDeps {
    pub repo: Arc<HeartRepo>,
    pub auth: Arc<Authenticator>,
    pub cancel: CancellationToken,
}

/// Spawns the scheduler task. The status receiver is live before login completes.
pub fn spawn(
    deps: SyncWorkerDeps,
    config: AppConfig,
) -> (JoinHandle<()>, watch::Receiver<SyncStatus>) {
    let (status_tx, status_rx) = watch::channel(SyncStatus::default());
    let handle = tokio::spawn(async move {
        let SyncWorkerDeps { repo, auth, cancel } = deps;

        info!("sync worker waiting for login");
        let Some(account_id) = auth.wait_for_account(&cancel).await else {
            debug!("sync worker cancelled before login");
            return;
        };

        let driver = match build_driver(&account_id, repo, auth, &config, &cancel, status_tx) {
            Ok(d) => d,
            Err(e) => {
                warn!(account = %account_id, error = %format!("{e:#}"), "sync worker failed to start");
                return;
            }
        };
        let schedule = match RunSchedule::from_config(&config) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "invalid sync schedule; sync worker will not run");
                return;
            }
        };

        run_loop(&driver, &schedule, &cancel).await;
        debug!(account = %account_id, "sync worker shutting down");
    });
    (handle, status_rx)
}

fn build_driver(
    account_id: &str,
    repo: Arc<HeartRepo>,
    auth: Arc<Authenticator>,
    config: &AppConfig,
    cancel: &CancellationToken,
    status: watch::Sender<SyncStatus>,
) -> anyhow::Result<BackfillDriver> {
    let token: Arc<dyn AccessToken> = auth;
    let client = FitbitClient::new(&config.fitbit.api_base_url, token)?;
    let fetcher = Fetcher::new(
        Arc::new(client),
        FetcherConfig {
            detail: config.fitbit.detail_level,
            margin: config.sync.rate_limit_margin(),
            timeout: config.sync.fetch_timeout(),
        },
        cancel.clone(),
    );
    let writer = Writer::new(repo.clone(), config.sync.insert_batch_size);
    Ok(BackfillDriver::new(
        account_id,
        Arc::new(fetcher),
        writer,
        repo,
        BackfillConfig {
            backfill_start: config.fitbit.backfill_start,
            empty_days_to_stop: config.sync.empty_days_to_stop,
            refetch_latest: config.sync.refetch_latest,
        },
        status,
    ))
}

/// Run, wait, repeat. A failed run is logged by the driver and the next one is still scheduled.
pub async fn run_loop(driver: &BackfillDriver, schedule: &RunSchedule, cancel: &CancellationToken) {
    loop {
        match driver.run().await {
            Ok(_) => {}
            Err(e) if e.is_cancelled() => break,
            Err(e) => debug!(error = %e, "sync run failed; retrying at next interval"),
        }

        let delay = schedule.next_delay(Local::now());
        debug!(delay_secs = delay.as_secs(), "next sync run scheduled");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => break,
        }
    }
}
