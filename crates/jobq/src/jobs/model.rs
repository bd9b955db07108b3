use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lowest accepted priority.
pub const PRIORITY_MIN: i64 = 1;
/// Highest accepted priority.
pub const PRIORITY_MAX: i64 = 5;
/// Priority used when the caller does not pass one.
pub const PRIORITY_DEFAULT: i64 = 3;

/// One persisted unit of work: a command, a priority, a status and timestamps.
///
/// `pid` is only present while the job is RUNNING and names the worker process
/// that supervises the command. `end_time` is the moment the end was *detected*,
/// which for stalled jobs can be much later than the actual death.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Job {
    pub id: i64,
    pub command: String,
    pub priority: i64,
    pub status: String,
    pub pid: Option<i64>,
    pub insert_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Job {
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::parse(&self.status)
    }

    /// Human readable priority name, as shown by `jobq list`.
    pub fn priority_name(&self) -> &'static str {
        match self.priority {
            1 => "LOWEST",
            2 => "LOW",
            3 => "NORMAL",
            4 => "HIGH",
            5 => "HIGHEST",
            _ => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Eligible for dispatch.
    Waiting,
    /// Dispatch issued; the worker process has not yet confirmed it is alive.
    Starting,
    /// Worker process confirmed alive; pid and start_time are set.
    Running,
    /// Command exited with code 0.
    Done,
    /// Command exited non-zero, or failed to launch.
    Failed,
    /// Never made it from STARTING to RUNNING.
    StartFailed,
    /// Was RUNNING but its pid is no longer alive on this host.
    Stalled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "WAITING",
            JobStatus::Starting => "STARTING",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
            JobStatus::StartFailed => "START_FAILED",
            JobStatus::Stalled => "STALLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WAITING" => Some(JobStatus::Waiting),
            "STARTING" => Some(JobStatus::Starting),
            "RUNNING" => Some(JobStatus::Running),
            "DONE" => Some(JobStatus::Done),
            "FAILED" => Some(JobStatus::Failed),
            "START_FAILED" => Some(JobStatus::StartFailed),
            "STALLED" => Some(JobStatus::Stalled),
            _ => None,
        }
    }

    /// True for states where no process is working on the job anymore. A
    /// terminal job only moves again through maintenance: retention deletes it,
    /// or (for START_FAILED) reconciliation requeues it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Failed | JobStatus::StartFailed | JobStatus::Stalled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
