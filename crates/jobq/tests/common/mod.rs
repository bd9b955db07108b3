// Helpers not every test binary uses.
#![allow(dead_code)]

use chrono::{Duration, Utc};
use jobq::jobs::{JobStatus, JobStore, ProcessInspector, ProcessMatch};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A fresh queue database in a private temp directory. Keep the handle alive
/// for the duration of the test; dropping it deletes the database file.
pub struct TestDb {
    pub store: JobStore,
    _dir: TempDir,
}

pub async fn setup_store() -> TestDb {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("jobq.db").display());

    let pool = jobq::db::make_pool(&url)
        .await
        .expect("failed to open test database");
    jobq::db::run_migrations(&pool)
        .await
        .expect("migrations failed");

    TestDb {
        store: JobStore::new(pool),
        _dir: dir,
    }
}

/// Put a job into an arbitrary status, bypassing the guarded transitions.
pub async fn force_status(store: &JobStore, id: i64, status: JobStatus) {
    sqlx::query("UPDATE jobs SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(store.pool())
        .await
        .expect("failed to force status");
}

pub async fn force_pid(store: &JobStore, id: i64, pid: i64) {
    sqlx::query("UPDATE jobs SET pid = ? WHERE id = ?")
        .bind(pid)
        .bind(id)
        .execute(store.pool())
        .await
        .expect("failed to force pid");
}

/// Move a job's end time `days` days into the past.
pub async fn backdate_end_time(store: &JobStore, id: i64, days: i64) {
    sqlx::query("UPDATE jobs SET end_time = ? WHERE id = ?")
        .bind(Utc::now() - Duration::days(days))
        .bind(id)
        .execute(store.pool())
        .await
        .expect("failed to backdate end time");
}

/// A scriptable host: tests decide which pids are alive and what a pattern
/// search turns up.
#[derive(Clone, Default)]
pub struct FakeInspector {
    alive: Arc<Mutex<HashSet<u32>>>,
    matches: Arc<Mutex<Vec<ProcessMatch>>>,
}

impl FakeInspector {
    pub fn mark_alive(&self, pid: u32) {
        self.alive.lock().unwrap().insert(pid);
    }

    pub fn mark_dead(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }

    pub fn add_match(&self, pid: u32, cwd: Option<PathBuf>) {
        self.matches.lock().unwrap().push(ProcessMatch { pid, cwd });
    }
}

impl ProcessInspector for FakeInspector {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    fn find_by_pattern(&self, _pattern: &str) -> Vec<ProcessMatch> {
        self.matches.lock().unwrap().clone()
    }
}
