mod common;
use common::{force_pid, force_status, setup_store, FakeInspector};

use jobq::jobs::runner::Pace;
use jobq::jobs::{
    JobExecutor, JobStatus, Runner, RunnerConfig, StallDetector, WorkerCommand,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn test_config(concurrency: usize) -> RunnerConfig {
    RunnerConfig {
        concurrency,
        poll_interval: Duration::from_millis(10),
        idle_interval: Duration::from_millis(10),
        // Keep the randomized retention sweep out of these tests.
        sweep_one_in: 0,
        retention_days: 7,
    }
}

fn test_runner(
    db: &common::TestDb,
    inspector: FakeInspector,
    worker: WorkerCommand,
    concurrency: usize,
) -> Runner<FakeInspector> {
    Runner::new(
        db.store.clone(),
        JobExecutor::new(db.store.clone(), "/bin/sh".to_string()),
        StallDetector::new(inspector),
        worker,
        CancellationToken::new(),
        test_config(concurrency),
    )
}

/// A worker stand-in that exits immediately without confirming RUNNING.
fn instant_worker() -> WorkerCommand {
    WorkerCommand {
        program: "/bin/true".into(),
        args: vec![],
    }
}

/// A worker stand-in that stays alive for a few seconds. The job id appended
/// by dispatch doubles as the sleep duration.
fn lingering_worker() -> WorkerCommand {
    WorkerCommand {
        program: "/bin/sleep".into(),
        args: vec![],
    }
}

#[tokio::test]
async fn an_empty_queue_paces_down_to_idle() {
    let db = setup_store().await;
    let mut runner = test_runner(&db, FakeInspector::default(), instant_worker(), 1);

    assert_eq!(runner.run_once().await.unwrap(), Pace::Idle);
    assert_eq!(runner.tracked_children(), 0);
}

#[tokio::test]
async fn a_waiting_job_is_claimed_and_its_worker_tracked() {
    let db = setup_store().await;
    let id = db.store.enqueue("echo hi", None).await.unwrap();
    let mut runner = test_runner(&db, FakeInspector::default(), lingering_worker(), 1);

    assert_eq!(runner.run_once().await.unwrap(), Pace::Poll);
    assert_eq!(runner.tracked_children(), 1);
    assert_eq!(db.store.get(id).await.unwrap().status(), Some(JobStatus::Starting));
}

#[tokio::test]
async fn the_limit_holds_while_a_worker_is_alive() {
    let db = setup_store().await;
    db.store.enqueue("first", None).await.unwrap();
    let second = db.store.enqueue("second", None).await.unwrap();
    let mut runner = test_runner(&db, FakeInspector::default(), lingering_worker(), 1);

    assert_eq!(runner.run_once().await.unwrap(), Pace::Poll);
    assert_eq!(runner.tracked_children(), 1);

    // The single slot is taken; the second job must stay queued.
    assert_eq!(runner.run_once().await.unwrap(), Pace::Poll);
    assert_eq!(runner.tracked_children(), 1);
    assert_eq!(db.store.get(second).await.unwrap().status(), Some(JobStatus::Waiting));
}

#[tokio::test]
async fn a_worker_that_dies_before_confirming_is_marked_start_failed() {
    let db = setup_store().await;
    let id = db.store.enqueue("echo hi", None).await.unwrap();
    let mut runner = test_runner(&db, FakeInspector::default(), instant_worker(), 1);

    assert_eq!(runner.run_once().await.unwrap(), Pace::Poll);
    assert_eq!(runner.tracked_children(), 1);

    // Give /bin/true a moment to exit, then reap it.
    tokio::time::sleep(Duration::from_millis(300)).await;
    runner.run_once().await.unwrap();

    assert_eq!(runner.tracked_children(), 0);
    assert_eq!(
        db.store.get(id).await.unwrap().status(),
        Some(JobStatus::StartFailed)
    );

    // Reconciliation sends it back for another attempt.
    let (stalled, requeued) = runner.reconcile().await.unwrap();
    assert_eq!((stalled, requeued), (0, 1));
    assert_eq!(db.store.get(id).await.unwrap().status(), Some(JobStatus::Waiting));
}

#[tokio::test]
async fn untracked_running_jobs_trigger_a_repair_pass() {
    let db = setup_store().await;
    let inspector = FakeInspector::default();

    // A RUNNING job from a previous runner whose process is gone.
    let orphan = db.store.enqueue("orphan", None).await.unwrap();
    force_status(&db.store, orphan, JobStatus::Running).await;
    force_pid(&db.store, orphan, 7777).await;

    let mut runner = test_runner(&db, inspector, instant_worker(), 1);

    assert_eq!(runner.run_once().await.unwrap(), Pace::Poll);
    assert_eq!(
        db.store.get(orphan).await.unwrap().status(),
        Some(JobStatus::Stalled)
    );
}

#[tokio::test]
async fn repair_leaves_genuinely_live_jobs_alone() {
    let db = setup_store().await;
    let inspector = FakeInspector::default();

    let live = db.store.enqueue("live", None).await.unwrap();
    force_status(&db.store, live, JobStatus::Running).await;
    force_pid(&db.store, live, 8888).await;
    inspector.mark_alive(8888);

    let mut runner = test_runner(&db, inspector, instant_worker(), 2);

    // The count mismatch is noticed but the live job survives both sweeps.
    assert_eq!(runner.run_once().await.unwrap(), Pace::Poll);
    assert_eq!(db.store.get(live).await.unwrap().status(), Some(JobStatus::Running));
}

#[tokio::test]
async fn the_loop_stops_when_the_token_is_cancelled() {
    let db = setup_store().await;
    let shutdown = CancellationToken::new();
    let mut runner = Runner::new(
        db.store.clone(),
        JobExecutor::new(db.store.clone(), "/bin/sh".to_string()),
        StallDetector::new(FakeInspector::default()),
        instant_worker(),
        shutdown.clone(),
        test_config(1),
    );

    let handle = tokio::spawn(async move { runner.run().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("runner did not stop after cancellation")
        .unwrap()
        .unwrap();
}
