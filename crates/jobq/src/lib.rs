//! Persistent, priority-ordered queue of shell commands with a single-node
//! worker supervisor.
//!
//! Clients enqueue commands with a priority; a long-running runner dequeues
//! the highest-priority waiting job, launches it as a detached worker process
//! and tracks its lifecycle in shared SQLite state. Jobs whose process died
//! without updating that state are detected and repaired by reconciliation.

pub mod config;
pub mod db;
pub mod jobs;
