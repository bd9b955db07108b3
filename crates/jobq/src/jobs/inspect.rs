use std::path::PathBuf;
use sysinfo::{Pid, System};

/// A process found by command-pattern search.
#[derive(Debug, Clone)]
pub struct ProcessMatch {
    pub pid: u32,
    pub cwd: Option<PathBuf>,
}

/// Host-local process inspection.
///
/// Liveness and enumeration go through the platform's native process tables
/// instead of shelling out to `ps`; the stall detector and the single-instance
/// guard both sit on top of this trait so tests can substitute a fake host.
pub trait ProcessInspector {
    /// Is a process with this pid currently alive on the host?
    fn is_alive(&self, pid: u32) -> bool;

    /// All processes whose command line contains `pattern`, with their
    /// resolved working directories where available.
    fn find_by_pattern(&self, pattern: &str) -> Vec<ProcessMatch>;
}

/// Inspector backed by the live process table.
///
/// A fresh snapshot is taken per call; stall detection must never act on a
/// cached view of the host.
#[derive(Debug, Clone, Default)]
pub struct HostInspector;

impl ProcessInspector for HostInspector {
    fn is_alive(&self, pid: u32) -> bool {
        let mut sys = System::new();
        sys.refresh_processes();
        sys.process(Pid::from_u32(pid)).is_some()
    }

    fn find_by_pattern(&self, pattern: &str) -> Vec<ProcessMatch> {
        let mut sys = System::new();
        sys.refresh_processes();

        let mut matches = Vec::new();
        for (pid, process) in sys.processes() {
            let cmdline = process.cmd().join(" ");
            if cmdline.contains(pattern) {
                matches.push(ProcessMatch {
                    pid: pid.as_u32(),
                    cwd: process.cwd().map(|p| p.to_path_buf()),
                });
            }
        }
        matches
    }
}
