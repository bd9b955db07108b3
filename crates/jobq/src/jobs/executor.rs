use crate::jobs::error::QueueError;
use crate::jobs::model::{Job, JobStatus};
use crate::jobs::store::JobStore;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

/// Exit code reported when a process died without one (spawn failure or
/// termination by signal).
pub const EXIT_UNKNOWN: i32 = -1;

/// How the runner re-invokes itself to execute a single job in the background.
/// The job id is appended as the final argument.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// The standard worker invocation: `<current exe> run <id>`.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: vec!["run".to_string()],
        })
    }
}

/// Runs job commands as child processes and reports outcomes through the
/// store. Captured output goes to the log, not to the caller; only the exit
/// code is returned.
#[derive(Clone)]
pub struct JobExecutor {
    store: JobStore,
    shell: String,
}

impl JobExecutor {
    pub fn new(store: JobStore, shell: String) -> Self {
        Self { store, shell }
    }

    /// Foreground-confirm mode, executed inside the per-job worker process.
    ///
    /// Marks the job RUNNING under this process's pid, then blocks until the
    /// command exits: 0 maps to DONE, anything else to FAILED. A failure to
    /// launch at all is also FAILED, with the error text logged. Commands run
    /// without a timeout.
    pub async fn execute(&self, id: i64) -> Result<i32, QueueError> {
        let job = self.store.get(id).await?;

        match job.status() {
            Some(JobStatus::Waiting) | Some(JobStatus::Starting) => {}
            _ => {
                warn!(job_id = id, status = %job.status, command = %job.command,
                    "running job that already ran");
            }
        }

        self.store.mark_running(id, std::process::id()).await?;
        info!(job_id = id, command = %job.command, pid = std::process::id(), "job started");

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(&job.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                error!(job_id = id, command = %job.command, error = %err,
                    "job failed to launch");
                self.settle(id, &job, JobStatus::Failed).await?;
                return Ok(EXIT_UNKNOWN);
            }
        };

        let exit_code = output.status.code().unwrap_or(EXIT_UNKNOWN);
        let stdout = String::from_utf8_lossy(&output.stdout);

        if exit_code == 0 {
            info!(job_id = id, command = %job.command, "job finished");
            debug!(job_id = id, output = %stdout, "job output");
            self.settle(id, &job, JobStatus::Done).await?;
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(job_id = id, command = %job.command, exit_code,
                output = %stdout, error_output = %stderr, "job failed");
            self.settle(id, &job, JobStatus::Failed).await?;
        }

        Ok(exit_code)
    }

    /// Background-dispatch mode, used by the main runner.
    ///
    /// Marks the job STARTING and spawns the detached worker process that will
    /// confirm RUNNING on its own. Returns the child handle for reaping, or
    /// None when the spawn call itself failed; the job then stays STARTING for
    /// stall reconciliation to resolve.
    pub async fn dispatch(
        &self,
        job: &Job,
        worker: &WorkerCommand,
    ) -> Result<Option<Child>, QueueError> {
        self.store.mark_starting(job.id).await?;

        let spawned = Command::new(&worker.program)
            .args(&worker.args)
            .arg(job.id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                debug!(job_id = job.id, command = %job.command, worker_pid = ?child.id(),
                    "dispatched job worker");
                Ok(Some(child))
            }
            Err(err) => {
                error!(job_id = job.id, command = %job.command, error = %err,
                    "failed to spawn job worker, leaving job STARTING");
                Ok(None)
            }
        }
    }

    /// Record a terminal outcome. A conflict here means another process
    /// already settled the job; log it and keep the exit code authoritative.
    async fn settle(&self, id: i64, job: &Job, to: JobStatus) -> Result<(), QueueError> {
        let result = match to {
            JobStatus::Done => self.store.mark_done(id).await,
            _ => self.store.mark_failed(id).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_conflict() => {
                warn!(job_id = id, command = %job.command, error = %err,
                    "job outcome already recorded elsewhere");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
