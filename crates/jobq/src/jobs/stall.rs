use crate::jobs::error::QueueError;
use crate::jobs::inspect::ProcessInspector;
use crate::jobs::model::JobStatus;
use crate::jobs::store::JobStore;
use tracing::{error, warn};

/// Detects and repairs jobs whose lifecycle updates were lost.
///
/// Two independent sweeps, run at startup and whenever the runner notices the
/// persisted running count drifting from its tracked children:
///
/// - stalled-running: RUNNING jobs whose pid is no longer alive become STALLED.
/// - stalled-starting: STARTING is a short-lived transient, so any job found
///   in it (or in START_FAILED) at sweep time lost its dispatcher and goes
///   back to WAITING for another attempt.
pub struct StallDetector<I> {
    inspector: I,
}

impl<I: ProcessInspector> StallDetector<I> {
    pub fn new(inspector: I) -> Self {
        Self { inspector }
    }

    pub fn inspector(&self) -> &I {
        &self.inspector
    }

    /// Mark RUNNING jobs with a dead (or missing) pid as STALLED.
    /// Returns how many were repaired; individual failures are logged and the
    /// sweep continues with the remaining jobs.
    pub async fn sweep_running(&self, store: &JobStore) -> Result<usize, QueueError> {
        let mut stalled = 0;
        for job in store.list_running().await? {
            let alive = job
                .pid
                .map(|pid| self.inspector.is_alive(pid as u32))
                .unwrap_or(false);
            if alive {
                continue;
            }
            match store.mark_stalled(job.id).await {
                Ok(()) => {
                    warn!(job_id = job.id, command = %job.command, pid = ?job.pid,
                        "running job has no live process, marked stalled");
                    stalled += 1;
                }
                Err(err) if err.is_conflict() => {
                    // Someone else settled the job between the read and the
                    // update; nothing to repair.
                }
                Err(err) => {
                    error!(job_id = job.id, error = %err, "failed to mark job stalled");
                }
            }
        }
        Ok(stalled)
    }

    /// Send STARTING and START_FAILED jobs back to WAITING.
    pub async fn sweep_starting(&self, store: &JobStore) -> Result<usize, QueueError> {
        let mut requeued = 0;
        for status in [JobStatus::Starting, JobStatus::StartFailed] {
            for job in store.list_by_status(status).await? {
                match store.mark_waiting(job.id).await {
                    Ok(()) => {
                        warn!(job_id = job.id, command = %job.command, from = %status,
                            "job never reached RUNNING, requeued");
                        requeued += 1;
                    }
                    Err(err) if err.is_conflict() => {}
                    Err(err) => {
                        error!(job_id = job.id, error = %err, "failed to requeue job");
                    }
                }
            }
        }
        Ok(requeued)
    }
}
