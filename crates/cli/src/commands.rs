use crate::output;
use jobq::config::Config;
use jobq::jobs::maintenance::{cutoff_days, Maintenance};
use jobq::jobs::runner::shutdown_token;
use jobq::jobs::{
    HostInspector, JobExecutor, JobStore, Runner, RunnerConfig, Scheduler, SingleInstanceGuard,
    StallDetector, WorkerCommand,
};
use std::time::Duration;
use tracing::{info, warn};

/// Distinguished "nothing to do" code: no free slot, empty queue, or a
/// rejected bookkeeping request. Distinct from a job's own failure code.
pub const EXIT_NOTHING_TO_DO: i32 = -1;

pub async fn add(
    store: &JobStore,
    cfg: &Config,
    command: &str,
    priority: Option<i64>,
) -> anyhow::Result<i32> {
    auto_cleanup(store, cfg).await;

    let id = store.enqueue(command, priority).await?;
    let position = store
        .list_waiting()
        .await?
        .iter()
        .position(|job| job.id == id)
        .map(|p| p + 1)
        .unwrap_or(0);
    println!("Queued \"{command}\" as job {id} (position {position})");
    Ok(0)
}

pub async fn remove(store: &JobStore, cfg: &Config, job_id: i64) -> anyhow::Result<i32> {
    auto_cleanup(store, cfg).await;

    match store.remove_waiting(job_id).await {
        Ok(job) => {
            println!("Removed \"{}\" from queue.", job.command);
            Ok(0)
        }
        Err(err) => {
            eprintln!("Cannot remove job {job_id}: {err}");
            Ok(EXIT_NOTHING_TO_DO)
        }
    }
}

pub async fn clear(store: &JobStore, cfg: &Config, force: bool) -> anyhow::Result<i32> {
    auto_cleanup(store, cfg).await;

    if !force {
        eprintln!("Refusing to clear the queue without --force");
        return Ok(EXIT_NOTHING_TO_DO);
    }

    println!("Clearing queue");
    // Leave a moment to abort.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let cleared = store.clear().await?;
    println!("Cleared {cleared} entries");
    Ok(0)
}

pub async fn list(store: &JobStore, cfg: &Config, json: bool) -> anyhow::Result<i32> {
    auto_cleanup(store, cfg).await;

    let waiting = store.list_waiting().await?;
    let running = store.list_running().await?;

    if json {
        output::print_json(&waiting, &running)?;
    } else {
        output::print_queued(&waiting);
        output::print_running(&running);
    }
    Ok(0)
}

pub async fn cleanup(store: &JobStore, cfg: &Config) -> anyhow::Result<i32> {
    println!("Starting cleanup");

    let detector = StallDetector::new(HostInspector);
    let stalled = detector.sweep_running(store).await?;
    if stalled > 0 {
        println!("Cleaned up {stalled} stalled jobs");
    }

    let maintenance = Maintenance::new(store.pool().clone());
    let cutoff = cutoff_days(cfg.aggressive_retention_days);
    let cleaned = maintenance.sweep_finished_older_than(cutoff, true).await?;
    if cleaned > 0 {
        println!("Cleaned up {cleaned} old entries from the queue");
    }

    println!("Done");
    Ok(0)
}

pub async fn process(store: &JobStore, cfg: &Config) -> anyhow::Result<i32> {
    auto_cleanup(store, cfg).await;

    let scheduler = Scheduler::new(cfg.concurrency);
    let occupied = scheduler.occupied_slots(store).await?;
    println!("{occupied} of max. {} jobs running.", cfg.concurrency);

    if occupied >= cfg.concurrency {
        println!("No slot free");
        return Ok(EXIT_NOTHING_TO_DO);
    }

    let Some(job) = store.next_waiting().await? else {
        println!("No job waiting for processing");
        return Ok(EXIT_NOTHING_TO_DO);
    };

    println!("Starting {} ({})", job.command, job.id);
    let executor = JobExecutor::new(store.clone(), cfg.shell.clone());
    let exit_code = executor.execute(job.id).await?;
    if exit_code == 0 {
        println!("Done");
    } else {
        println!("Failed");
    }
    Ok(exit_code)
}

pub async fn run(store: &JobStore, cfg: &Config, job_id: i64) -> anyhow::Result<i32> {
    let executor = JobExecutor::new(store.clone(), cfg.shell.clone());
    let exit_code = executor.execute(job_id).await?;
    Ok(exit_code)
}

pub async fn runner(store: &JobStore, cfg: &Config) -> anyhow::Result<i32> {
    let guard = SingleInstanceGuard::for_current_process(HostInspector)?;
    if let Some(pid) = guard.already_running() {
        // Not an error: cron re-triggers the runner to recover after crashes,
        // and most of those triggers find a healthy instance.
        info!(pid, "queue runner still running, exiting");
        return Ok(0);
    }

    let executor = JobExecutor::new(store.clone(), cfg.shell.clone());
    let detector = StallDetector::new(HostInspector);
    let worker = WorkerCommand::current_exe()?;
    let shutdown = shutdown_token();

    let mut runner = Runner::new(
        store.clone(),
        executor,
        detector,
        worker,
        shutdown,
        RunnerConfig {
            concurrency: cfg.concurrency,
            poll_interval: cfg.poll_interval,
            idle_interval: cfg.idle_interval,
            sweep_one_in: cfg.sweep_one_in,
            retention_days: cfg.retention_days,
        },
    );
    runner.run().await?;
    Ok(0)
}

/// Routine garbage collection before bookkeeping commands.
async fn auto_cleanup(store: &JobStore, cfg: &Config) {
    if !cfg.auto_cleanup {
        return;
    }
    let maintenance = Maintenance::new(store.pool().clone());
    let cutoff = cutoff_days(cfg.retention_days);
    match maintenance.sweep_finished_older_than(cutoff, false).await {
        Ok(0) => {}
        Ok(cleaned) => info!(cleaned, "cleaned up old entries from the queue"),
        Err(err) => warn!(error = %err, "auto cleanup failed"),
    }
}
