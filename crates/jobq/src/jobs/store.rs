use crate::jobs::error::QueueError;
use crate::jobs::model::{Job, JobStatus, PRIORITY_DEFAULT, PRIORITY_MAX, PRIORITY_MIN};
use chrono::Utc;
use sqlx::SqlitePool;

/// The only component that touches storage. Every status change is a single
/// guarded UPDATE so that cooperating processes (the runner and each per-job
/// worker) coordinate purely through the persisted state machine.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ----------------------------
    // Enqueue
    // ----------------------------

    /// Add a command to the queue.
    ///
    /// Re-enqueuing a command that is already WAITING updates its priority in
    /// place and returns the existing id instead of creating a duplicate.
    pub async fn enqueue(&self, command: &str, priority: Option<i64>) -> Result<i64, QueueError> {
        let priority = priority.unwrap_or(PRIORITY_DEFAULT);
        if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&priority) {
            return Err(QueueError::InvalidPriority(priority));
        }

        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64, i64)> = sqlx::query_as(
            "SELECT id, priority FROM jobs WHERE command = ? AND status = ? LIMIT 1",
        )
        .bind(command)
        .bind(JobStatus::Waiting.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((id, old_priority)) = existing {
            if old_priority != priority {
                sqlx::query("UPDATE jobs SET priority = ? WHERE id = ?")
                    .bind(priority)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            return Ok(id);
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (command, priority, status, insert_time)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(command)
        .bind(priority)
        .bind(JobStatus::Waiting.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get(&self, id: i64) -> Result<Job, QueueError> {
        self.get_opt(id).await?.ok_or(QueueError::NotFound(id))
    }

    pub async fn get_opt(&self, id: i64) -> Result<Option<Job>, QueueError> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    pub async fn count_by_status(&self, statuses: &[JobStatus]) -> Result<i64, QueueError> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!("SELECT COUNT(*) FROM jobs WHERE status IN ({placeholders})");
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        Ok(query.fetch_one(&self.pool).await?)
    }

    /// The job that would be dispatched next: highest priority first, then
    /// earliest insert time. Always re-read immediately before claiming;
    /// priorities can be changed underneath us by a re-enqueue.
    pub async fn next_waiting(&self) -> Result<Option<Job>, QueueError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE status = ?
            ORDER BY priority DESC, insert_time ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(JobStatus::Waiting.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    /// WAITING jobs in dispatch order.
    pub async fn list_waiting(&self) -> Result<Vec<Job>, QueueError> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE status = ?
            ORDER BY priority DESC, insert_time ASC, id ASC
            "#,
        )
        .bind(JobStatus::Waiting.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    /// RUNNING jobs ordered by start time.
    pub async fn list_running(&self) -> Result<Vec<Job>, QueueError> {
        let jobs = sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE status = ? ORDER BY start_time ASC",
        )
        .bind(JobStatus::Running.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    pub async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, QueueError> {
        let jobs = sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE status = ? ORDER BY id ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    // ----------------------------
    // State transitions
    // ----------------------------

    /// WAITING -> STARTING: the runner claims a job for dispatch.
    pub async fn mark_starting(&self, id: i64) -> Result<(), QueueError> {
        let affected = sqlx::query("UPDATE jobs SET status = ? WHERE id = ? AND status = ?")
            .bind(JobStatus::Starting.as_str())
            .bind(id)
            .bind(JobStatus::Waiting.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(self.conflict_for(id, "WAITING").await);
        }
        Ok(())
    }

    /// -> RUNNING: the worker process records its own pid and the start time.
    ///
    /// Deliberately unguarded. The worker warns when the job was not
    /// WAITING/STARTING beforehand but still proceeds, so a lost earlier
    /// update never wedges execution.
    pub async fn mark_running(&self, id: i64, pid: u32) -> Result<(), QueueError> {
        let affected =
            sqlx::query("UPDATE jobs SET status = ?, pid = ?, start_time = ? WHERE id = ?")
                .bind(JobStatus::Running.as_str())
                .bind(pid as i64)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        if affected == 0 {
            return Err(QueueError::NotFound(id));
        }
        Ok(())
    }

    /// RUNNING -> DONE: command exited with code 0.
    pub async fn mark_done(&self, id: i64) -> Result<(), QueueError> {
        self.finish(id, JobStatus::Done, JobStatus::Running).await
    }

    /// RUNNING -> FAILED: command exited non-zero or the launch itself failed.
    pub async fn mark_failed(&self, id: i64) -> Result<(), QueueError> {
        self.finish(id, JobStatus::Failed, JobStatus::Running).await
    }

    /// RUNNING -> STALLED: the recorded pid is no longer alive on this host.
    pub async fn mark_stalled(&self, id: i64) -> Result<(), QueueError> {
        self.finish(id, JobStatus::Stalled, JobStatus::Running).await
    }

    /// STARTING -> START_FAILED: the dispatching process died before the
    /// worker ever confirmed RUNNING.
    pub async fn mark_start_failed(&self, id: i64) -> Result<(), QueueError> {
        let affected = sqlx::query(
            "UPDATE jobs SET status = ?, end_time = ? WHERE id = ? AND status = ?",
        )
        .bind(JobStatus::StartFailed.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(JobStatus::Starting.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(self.conflict_for(id, "STARTING").await);
        }
        Ok(())
    }

    /// STARTING/START_FAILED -> WAITING: reconciliation sends the job back to
    /// the queue for another attempt. Clears any partial lifecycle fields.
    pub async fn mark_waiting(&self, id: i64) -> Result<(), QueueError> {
        let affected = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, pid = NULL, start_time = NULL, end_time = NULL
            WHERE id = ? AND status IN (?, ?)
            "#,
        )
        .bind(JobStatus::Waiting.as_str())
        .bind(id)
        .bind(JobStatus::Starting.as_str())
        .bind(JobStatus::StartFailed.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(self.conflict_for(id, "STARTING or START_FAILED").await);
        }
        Ok(())
    }

    // ----------------------------
    // Removal
    // ----------------------------

    /// Remove a single job. Only WAITING jobs may be removed; anything already
    /// dispatched is rejected with a conflict.
    pub async fn remove_waiting(&self, id: i64) -> Result<Job, QueueError> {
        let job = self.get(id).await?;
        let affected = sqlx::query("DELETE FROM jobs WHERE id = ? AND status = ?")
            .bind(id)
            .bind(JobStatus::Waiting.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(self.conflict_for(id, "WAITING").await);
        }
        Ok(job)
    }

    /// Remove every job that is not currently RUNNING. Returns the count.
    pub async fn clear(&self) -> Result<u64, QueueError> {
        let affected = sqlx::query("DELETE FROM jobs WHERE status != ?")
            .bind(JobStatus::Running.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    // ----------------------------
    // Helpers
    // ----------------------------

    async fn finish(
        &self,
        id: i64,
        to: JobStatus,
        expected: JobStatus,
    ) -> Result<(), QueueError> {
        let affected = sqlx::query(
            "UPDATE jobs SET status = ?, pid = NULL, end_time = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(self.conflict_for(id, expected.as_str()).await);
        }
        Ok(())
    }

    async fn conflict_for(&self, id: i64, expected: &'static str) -> QueueError {
        match self.get_opt(id).await {
            Ok(Some(job)) => QueueError::Conflict {
                id,
                actual: job.status,
                expected,
            },
            Ok(None) => QueueError::NotFound(id),
            Err(err) => err,
        }
    }
}
