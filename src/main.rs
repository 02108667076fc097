use anyhow::Result;
use fitbit_exporter::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let repo = Arc::new(
        heart_repo::HeartRepo::connect(&app_config.database.path, app_config.database.max_pool_size)
            .await?,
    );
    repo.init().await?;

    let auth = Arc::new(
        fitbit_client::Authenticator::load(app_config.fitbit.clone(), repo.clone()).await?,
    );
    match auth.account_id() {
        Some(account_id) => {
            let counts = repo.counts(&account_id).await?;
            tracing::info!(
                account = %account_id,
                daily_summaries = counts.daily_summaries,
                zone_summaries = counts.zone_summaries,
                intraday_samples = counts.intraday_samples,
                "Stored heart-rate records"
            );
        }
        None => tracing::info!(
            "No stored Fitbit login; open http://{}:{}/login to authorize",
            app_config.server.host,
            app_config.server.port
        ),
    }

    let cancel = CancellationToken::new();
    let (worker_handle, status_rx) = sync_worker::spawn(
        sync_worker::SyncWorkerDeps {
            repo: repo.clone(),
            auth: auth.clone(),
            cancel: cancel.clone(),
        },
        app_config.clone(),
    );

    let app = routes::app(status_rx, repo, auth);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            cancel.cancel();
            let _ = worker_handle.await;
        }
    }

    Ok(())
}
