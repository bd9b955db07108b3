use crate::jobs::error::QueueError;
use crate::jobs::executor::{JobExecutor, WorkerCommand};
use crate::jobs::inspect::ProcessInspector;
use crate::jobs::maintenance::{cutoff_days, Maintenance};
use crate::jobs::model::JobStatus;
use crate::jobs::scheduler::Scheduler;
use crate::jobs::stall::StallDetector;
use crate::jobs::store::JobStore;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum number of jobs in RUNNING/STARTING at once.
    pub concurrency: usize,
    /// Sleep between loop iterations while there is work to watch.
    pub poll_interval: Duration,
    /// Longer sleep when the queue is empty.
    pub idle_interval: Duration,
    /// Run the routine retention sweep roughly once per this many iterations
    /// (0 disables it).
    pub sweep_one_in: u32,
    /// Age of DONE jobs removed by the routine sweep.
    pub retention_days: i64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval: Duration::from_secs(1),
            idle_interval: Duration::from_secs(10),
            sweep_one_in: 1000,
            retention_days: 7,
        }
    }
}

/// How long to sleep after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Poll,
    Idle,
}

/// The supervising control loop.
///
/// Owns the poll/dispatch/reap cycle and the tracked child handles for jobs
/// this instance dispatched. Coordination with the per-job workers happens
/// only through the store; a runner restart loses the handles but not the
/// jobs, which startup reconciliation then repairs.
pub struct Runner<I> {
    store: JobStore,
    scheduler: Scheduler,
    executor: JobExecutor,
    detector: StallDetector<I>,
    maintenance: Maintenance,
    worker: WorkerCommand,
    children: HashMap<i64, Child>,
    shutdown: CancellationToken,
    cfg: RunnerConfig,
}

impl<I: ProcessInspector> Runner<I> {
    pub fn new(
        store: JobStore,
        executor: JobExecutor,
        detector: StallDetector<I>,
        worker: WorkerCommand,
        shutdown: CancellationToken,
        cfg: RunnerConfig,
    ) -> Self {
        let maintenance = Maintenance::new(store.pool().clone());
        Self {
            scheduler: Scheduler::new(cfg.concurrency),
            store,
            executor,
            detector,
            maintenance,
            worker,
            children: HashMap::new(),
            shutdown,
            cfg,
        }
    }

    /// Number of children this instance is currently tracking.
    pub fn tracked_children(&self) -> usize {
        self.children.len()
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// In-flight children are never killed on shutdown; they continue
    /// independently and the next runner's startup reconciliation settles
    /// whatever state they leave behind.
    pub async fn run(&mut self) -> Result<(), QueueError> {
        info!(pid = std::process::id(), concurrency = self.cfg.concurrency, "runner started");

        // Repair whatever a previous runner left behind before dispatching
        // anything new.
        let (stalled, requeued) = self.reconcile().await?;
        if stalled > 0 || requeued > 0 {
            info!(stalled, requeued, "startup reconciliation repaired jobs");
        }

        while !self.shutdown.is_cancelled() {
            let pace = match self.run_once().await {
                Ok(pace) => pace,
                Err(err) => {
                    // Store trouble is not fatal to the runner; back off and
                    // retry on the next iteration.
                    error!(error = %err, "runner iteration failed");
                    Pace::Idle
                }
            };
            let nap = match pace {
                Pace::Poll => self.cfg.poll_interval,
                Pace::Idle => self.cfg.idle_interval,
            };
            tokio::select! {
                _ = tokio::time::sleep(nap) => {}
                _ = self.shutdown.cancelled() => {}
            }
        }

        info!(pid = std::process::id(), "runner terminated");
        Ok(())
    }

    /// One pass of the poll/dispatch/reap cycle.
    pub async fn run_once(&mut self) -> Result<Pace, QueueError> {
        // Garbage collect once in a while.
        if self.cfg.sweep_one_in > 0
            && rand::thread_rng().gen_range(0..self.cfg.sweep_one_in) == 0
        {
            let cutoff = cutoff_days(self.cfg.retention_days);
            match self.maintenance.sweep_finished_older_than(cutoff, false).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "retention sweep removed old jobs"),
                Err(err) => warn!(error = %err, "retention sweep failed"),
            }
        }

        self.reap().await;

        let occupied = self.scheduler.occupied_slots(&self.store).await?;

        // More jobs marked running than children we track: some job's
        // supervision was lost (e.g. a runner restart). Repair instead of
        // dispatching on top of a lie.
        if occupied > self.children.len() {
            info!(occupied, children = self.children.len(),
                "running count differs from tracked children");
            let repaired = self.detector.sweep_running(&self.store).await?;
            if occupied.saturating_sub(repaired) > self.children.len() {
                self.detector.sweep_starting(&self.store).await?;
            }
            return Ok(Pace::Poll);
        }

        if occupied >= self.scheduler.concurrency() {
            debug!(occupied, limit = self.scheduler.concurrency(), "queue is at the limit");
            return Ok(Pace::Poll);
        }

        let Some(job) = self.store.next_waiting().await? else {
            debug!(limit = self.scheduler.concurrency(), "queue is empty");
            return Ok(Pace::Idle);
        };

        match self.executor.dispatch(&job, &self.worker).await {
            Ok(Some(child)) => {
                self.children.insert(job.id, child);
            }
            Ok(None) => {
                // Spawn failed; the job stays STARTING until reconciliation.
            }
            Err(err) if err.is_conflict() => {
                debug!(job_id = job.id, error = %err, "job claimed elsewhere before dispatch");
            }
            Err(err) => return Err(err),
        }

        Ok(Pace::Poll)
    }

    /// Drop exited children and settle jobs that died while STARTING.
    async fn reap(&mut self) {
        let mut exited = Vec::new();
        for (id, child) in self.children.iter_mut() {
            match child.try_wait() {
                Ok(Some(_)) => exited.push(*id),
                Ok(None) => {}
                Err(err) => {
                    warn!(job_id = id, error = %err, "could not poll child, dropping handle");
                    exited.push(*id);
                }
            }
        }

        for id in exited {
            self.children.remove(&id);
            match self.store.get_opt(id).await {
                Ok(Some(job)) if job.status() == Some(JobStatus::Starting) => {
                    error!(job_id = id, command = %job.command,
                        "worker exited before confirming RUNNING, marking start failed");
                    if let Err(err) = self.store.mark_start_failed(id).await {
                        if !err.is_conflict() {
                            error!(job_id = id, error = %err, "failed to mark start failed");
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(job_id = id, error = %err, "could not check reaped job");
                }
            }
        }
    }

    /// Both stall sweeps; returns (stalled, requeued) counts.
    pub async fn reconcile(&self) -> Result<(usize, usize), QueueError> {
        let stalled = self.detector.sweep_running(&self.store).await?;
        let requeued = self.detector.sweep_starting(&self.store).await?;
        Ok((stalled, requeued))
    }
}

/// A token cancelled by SIGINT/SIGTERM. The loop checks it cooperatively; the
/// current iteration always completes before exit.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut term = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(term) => term,
                Err(err) => {
                    error!(error = %err, "could not install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("caught interrupt, stopping"),
                _ = term.recv() => info!("caught terminate, stopping"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("caught interrupt, stopping");
        }
        handle.cancel();
    });
    token
}
