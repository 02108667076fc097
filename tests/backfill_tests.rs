// Backfill driver tests: forward top-up, backward walk termination, status transitions

mod common;

use chrono::Duration;
use common::*;
use fitbit_exporter::backfill::{BackfillConfig, BackfillDriver};
use fitbit_exporter::error::SyncError;
use fitbit_exporter::heart_repo::HeartRepo;
use fitbit_exporter::models::{RunOutcome, SyncState, SyncStatus};
use fitbit_exporter::writer::Writer;
use std::sync::Arc;
use tokio::sync::watch;

fn driver(
    repo: &Arc<HeartRepo>,
    source: &Arc<ScriptedSource>,
    backfill_start: Option<chrono::NaiveDate>,
) -> (BackfillDriver, watch::Receiver<SyncStatus>) {
    driver_with(
        repo,
        source,
        BackfillConfig {
            backfill_start,
            empty_days_to_stop: 2,
            refetch_latest: false,
        },
    )
}

fn driver_with(
    repo: &Arc<HeartRepo>,
    source: &Arc<ScriptedSource>,
    config: BackfillConfig,
) -> (BackfillDriver, watch::Receiver<SyncStatus>) {
    let (tx, rx) = watch::channel(SyncStatus::default());
    let driver = BackfillDriver::new(
        ACCOUNT,
        source.clone(),
        Writer::new(repo.clone(), 200),
        repo.clone(),
        config,
        tx,
    );
    (driver, rx)
}

async fn seed(repo: &Arc<HeartRepo>, day: chrono::NaiveDate) {
    Writer::new(repo.clone(), 200)
        .persist(ACCOUNT, day, &day_payload(day, 60, minute_samples(2, 70)))
        .await
        .unwrap();
}

#[tokio::test]
async fn top_up_fetches_each_missing_day_in_order() {
    let (_dir, repo) = temp_repo().await;
    let latest = date(2024, 5, 10);
    seed(&repo, latest).await;
    let today = latest + Duration::days(5);
    let source = Arc::new(ScriptedSource::default());
    let (driver, _rx) = driver(&repo, &source, None);

    let days = driver.top_up(today).await.unwrap();

    assert_eq!(days, 5);
    let expected: Vec<_> = (1..=5).map(|i| latest + Duration::days(i)).collect();
    assert_eq!(source.calls(), expected);
}

#[tokio::test]
async fn top_up_refetches_today_when_up_to_date() {
    let (_dir, repo) = temp_repo().await;
    let today = date(2024, 5, 10);
    seed(&repo, today).await;
    let source = Arc::new(ScriptedSource::default());
    let (driver, _rx) = driver(&repo, &source, None);

    driver.top_up(today).await.unwrap();

    assert_eq!(source.calls(), vec![today]);
}

#[tokio::test]
async fn top_up_refetches_latest_day_when_enabled() {
    let (_dir, repo) = temp_repo().await;
    let latest = date(2024, 5, 10);
    // Fetched late on its own day: no resting rate yet, only part of the intraday series.
    Writer::new(repo.clone(), 200)
        .persist(ACCOUNT, latest, &day_payload(latest, 0, minute_samples(2, 70)))
        .await
        .unwrap();
    let today = latest + Duration::days(2);
    let mut script = ScriptedSource::default();
    script
        .days
        .insert(latest, day_payload(latest, 58, minute_samples(5, 70)));
    let source = Arc::new(script);
    let (driver, _rx) = driver_with(
        &repo,
        &source,
        BackfillConfig {
            backfill_start: None,
            empty_days_to_stop: 2,
            refetch_latest: true,
        },
    );

    let days = driver.top_up(today).await.unwrap();

    assert_eq!(days, 3);
    assert_eq!(
        source.calls(),
        vec![latest, latest + Duration::days(1), today]
    );
    assert_eq!(repo.resting_on(ACCOUNT, latest).await.unwrap(), Some(58));
    assert_eq!(repo.counts(ACCOUNT).await.unwrap().intraday_samples, 5);
}

#[tokio::test]
async fn top_up_refetch_does_not_repeat_today() {
    let (_dir, repo) = temp_repo().await;
    let today = date(2024, 5, 10);
    seed(&repo, today).await;
    let source = Arc::new(ScriptedSource::default());
    let (driver, _rx) = driver_with(
        &repo,
        &source,
        BackfillConfig {
            backfill_start: None,
            empty_days_to_stop: 2,
            refetch_latest: true,
        },
    );

    driver.top_up(today).await.unwrap();

    assert_eq!(source.calls(), vec![today]);
}

#[tokio::test]
async fn top_up_with_empty_store_fetches_only_today() {
    let (_dir, repo) = temp_repo().await;
    let today = date(2024, 5, 10);
    let source = Arc::new(ScriptedSource::default());
    let (driver, _rx) = driver(&repo, &source, None);

    driver.top_up(today).await.unwrap();

    assert_eq!(source.calls(), vec![today]);
}

#[tokio::test]
async fn backfill_stops_after_two_consecutive_empty_days() {
    let (_dir, repo) = temp_repo().await;
    let earliest = date(2024, 5, 20);
    seed(&repo, earliest).await;
    // Three more days of history before the seeded one, then nothing.
    let history: Vec<_> = (1..=3).map(|i| earliest - Duration::days(i)).collect();
    let source = Arc::new(ScriptedSource::with_days(history.clone()));
    let (driver, _rx) = driver(&repo, &source, Some(date(2020, 1, 1)));

    let days = driver.backfill(date(2024, 6, 1)).await.unwrap();

    // 3 days with data + 2 empty ones.
    assert_eq!(days, 5);
    let calls = source.calls();
    assert_eq!(calls.len(), 5);
    assert_eq!(calls[..3], history[..]);
    assert_eq!(calls[3], earliest - Duration::days(4));
    assert_eq!(calls[4], earliest - Duration::days(5));
    assert_eq!(repo.earliest_date(ACCOUNT).await.unwrap(), Some(history[2]));
}

#[tokio::test]
async fn backfill_empty_counter_resets_on_data() {
    let (_dir, repo) = temp_repo().await;
    let earliest = date(2024, 5, 20);
    seed(&repo, earliest).await;
    // gap of one empty day, then data again
    let source = Arc::new(ScriptedSource::with_days([earliest - Duration::days(2)]));
    let (driver, _rx) = driver(&repo, &source, Some(date(2020, 1, 1)));

    driver.backfill(date(2024, 6, 1)).await.unwrap();

    let expected: Vec<_> = (1..=4).map(|i| earliest - Duration::days(i)).collect();
    assert_eq!(source.calls(), expected);
}

#[tokio::test]
async fn backfill_never_goes_below_start_date() {
    let (_dir, repo) = temp_repo().await;
    let earliest = date(2024, 1, 4);
    seed(&repo, earliest).await;
    let history: Vec<_> = (1..=10).map(|i| earliest - Duration::days(i)).collect();
    let source = Arc::new(ScriptedSource::with_days(history));
    let floor = date(2024, 1, 1);
    let (driver, _rx) = driver(&repo, &source, Some(floor));

    let days = driver.backfill(date(2024, 6, 1)).await.unwrap();

    assert_eq!(days, 3);
    assert!(source.calls().iter().all(|d| *d >= floor));
}

#[tokio::test]
async fn run_tops_up_then_backfills() {
    let (_dir, repo) = temp_repo().await;
    let seeded = date(2024, 5, 20);
    seed(&repo, seeded).await;
    let today = seeded + Duration::days(2);
    let source = Arc::new(ScriptedSource::with_days([
        seeded + Duration::days(1),
        seeded + Duration::days(2),
    ]));
    let (driver, rx) = driver(&repo, &source, Some(date(2024, 1, 1)));

    let days = driver.run_at(today).await.unwrap();

    assert_eq!(days, 4);
    assert_eq!(
        source.calls(),
        vec![
            seeded + Duration::days(1),
            seeded + Duration::days(2),
            seeded - Duration::days(1),
            seeded - Duration::days(2),
        ]
    );
    let status = rx.borrow().clone();
    assert_eq!(status.state, SyncState::Idle);
    assert!(!status.running);
    assert_eq!(status.runs_completed, 1);
    assert_eq!(status.account_id.as_deref(), Some(ACCOUNT));
    assert_eq!(
        status.last_outcome,
        Some(RunOutcome::Complete { days_processed: 4 })
    );
    assert!(status.last_run_started_at.is_some());
    assert!(status.last_run_finished_at.is_some());
    assert!(status.current_date.is_none());
}

#[tokio::test]
async fn run_without_backfill_start_only_tops_up() {
    let (_dir, repo) = temp_repo().await;
    let seeded = date(2024, 5, 20);
    seed(&repo, seeded).await;
    let source = Arc::new(ScriptedSource::default());
    let (driver, _rx) = driver(&repo, &source, None);

    driver.run_at(seeded + Duration::days(1)).await.unwrap();

    assert_eq!(source.calls(), vec![seeded + Duration::days(1)]);
}

#[tokio::test]
async fn failed_fetch_aborts_run_and_records_failure() {
    let (_dir, repo) = temp_repo().await;
    let seeded = date(2024, 5, 20);
    seed(&repo, seeded).await;
    let bad = seeded + Duration::days(2);
    let mut script = ScriptedSource::with_days([seeded + Duration::days(1)]);
    script.fail_on.insert(bad);
    let source = Arc::new(script);
    let (driver, rx) = driver(&repo, &source, Some(date(2024, 1, 1)));

    let err = driver.run_at(seeded + Duration::days(4)).await.unwrap_err();

    assert!(matches!(err, SyncError::Api(_)));
    // nothing after the failing date
    assert_eq!(source.calls().last(), Some(&bad));
    assert_eq!(repo.latest_date(ACCOUNT).await.unwrap(), Some(seeded + Duration::days(1)));

    let status = rx.borrow().clone();
    assert_eq!(status.runs_failed, 1);
    assert!(!status.running);
    match status.last_outcome {
        Some(RunOutcome::Failed { failed_date, .. }) => assert_eq!(failed_date, Some(bad)),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_run_is_not_counted_as_failure() {
    let (_dir, repo) = temp_repo().await;
    let seeded = date(2024, 5, 20);
    seed(&repo, seeded).await;
    let mut script = ScriptedSource::default();
    script.cancel_on.insert(seeded + Duration::days(1));
    let source = Arc::new(script);
    let (driver, rx) = driver(&repo, &source, Some(date(2024, 1, 1)));

    let err = driver.run_at(seeded + Duration::days(3)).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(source.calls(), vec![seeded + Duration::days(1)]);
    let status = rx.borrow().clone();
    assert_eq!(status.state, SyncState::Idle);
    assert!(!status.running);
    assert!(status.current_date.is_none());
    assert_eq!(status.runs_failed, 0);
    assert_eq!(status.runs_completed, 0);
    assert_eq!(status.last_outcome, None);
}

#[tokio::test]
async fn completed_history_costs_only_two_empty_fetches() {
    let (_dir, repo) = temp_repo().await;
    let earliest = date(2024, 5, 20);
    seed(&repo, earliest).await;
    let source = Arc::new(ScriptedSource::default());
    let (driver, _rx) = driver(&repo, &source, Some(date(2020, 1, 1)));

    driver.backfill(date(2024, 6, 1)).await.unwrap();
    driver.backfill(date(2024, 6, 1)).await.unwrap();

    // Empty days are never stored, so each pass asks for the same two dates.
    let tail = vec![earliest - Duration::days(1), earliest - Duration::days(2)];
    assert_eq!(source.calls()[..2], tail[..]);
    assert_eq!(source.calls()[2..], tail[..]);
}
