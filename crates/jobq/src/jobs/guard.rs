use crate::jobs::inspect::ProcessInspector;
use std::path::PathBuf;
use tracing::debug;

/// Command-line pattern that identifies a live runner process.
pub const RUNNER_PATTERN: &str = "jobq runner";

/// Best-effort, host-local check that only one runner supervises a deployment.
///
/// Matches processes by command signature, skips the calling process, and
/// compares resolved working directories: two runners in different deployments
/// on the same host are allowed, a second one in the same directory is not.
/// This is not a distributed lock.
pub struct SingleInstanceGuard<I> {
    inspector: I,
    pattern: String,
    own_pid: u32,
    own_cwd: PathBuf,
}

impl<I: ProcessInspector> SingleInstanceGuard<I> {
    pub fn new(inspector: I, pattern: &str, own_pid: u32, own_cwd: PathBuf) -> Self {
        Self {
            inspector,
            pattern: pattern.to_string(),
            own_pid,
            own_cwd,
        }
    }

    /// Guard for the calling process, using its real pid and working
    /// directory.
    pub fn for_current_process(inspector: I) -> std::io::Result<Self> {
        Ok(Self::new(
            inspector,
            RUNNER_PATTERN,
            std::process::id(),
            std::env::current_dir()?,
        ))
    }

    /// The pid of another live runner for this working directory, or None.
    pub fn already_running(&self) -> Option<u32> {
        for candidate in self.inspector.find_by_pattern(&self.pattern) {
            if candidate.pid == self.own_pid {
                continue;
            }
            let Some(cwd) = candidate.cwd else {
                debug!(pid = candidate.pid, "runner candidate has no resolvable cwd, skipping");
                continue;
            };
            if cwd == self.own_cwd {
                return Some(candidate.pid);
            }
        }
        None
    }
}
