use crate::jobs::error::QueueError;
use crate::jobs::model::JobStatus;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

/// Retention sweep over terminal jobs.
///
/// The routine sweep only deletes DONE jobs; the aggressive sweep (used by
/// `jobq cleanup`) also drops FAILED and STALLED ones. Selection is by the
/// detected end time, so jobs that never concluded are always kept.
#[derive(Clone)]
pub struct Maintenance {
    pool: SqlitePool,
}

impl Maintenance {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete terminal jobs whose end time is older than `cutoff`.
    /// Returns the number removed.
    pub async fn sweep_finished_older_than(
        &self,
        cutoff: DateTime<Utc>,
        aggressive: bool,
    ) -> Result<u64, QueueError> {
        let mut statuses = vec![JobStatus::Done];
        if aggressive {
            statuses.push(JobStatus::Failed);
            statuses.push(JobStatus::Stalled);
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "DELETE FROM jobs
             WHERE status IN ({placeholders})
               AND end_time IS NOT NULL
               AND end_time < ?"
        );

        let mut query = sqlx::query(&sql);
        for status in &statuses {
            query = query.bind(status.as_str());
        }
        query = query.bind(cutoff);

        Ok(query.execute(&self.pool).await?.rows_affected())
    }
}

/// Convenience: compute a cutoff like "now - N days".
pub fn cutoff_days(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}
