use crate::jobs::error::QueueError;
use crate::jobs::model::{Job, JobStatus};
use crate::jobs::store::JobStore;

/// Statuses that occupy an execution slot.
pub const OCCUPYING: [JobStatus; 2] = [JobStatus::Running, JobStatus::Starting];

/// Selects the next eligible job under the configured concurrency limit.
///
/// Ordering is priority descending, then insert time ascending; the candidate
/// is re-read from the store at selection time, never cached across the claim.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    concurrency: usize,
}

impl Scheduler {
    pub fn new(concurrency: usize) -> Self {
        Self { concurrency }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Jobs currently holding a slot (RUNNING or STARTING).
    pub async fn occupied_slots(&self, store: &JobStore) -> Result<usize, QueueError> {
        Ok(store.count_by_status(&OCCUPYING).await? as usize)
    }

    pub async fn has_free_slot(&self, store: &JobStore) -> Result<bool, QueueError> {
        Ok(self.occupied_slots(store).await? < self.concurrency)
    }

    /// The next WAITING job, or None when the queue is empty or every slot is
    /// taken.
    pub async fn next_eligible(&self, store: &JobStore) -> Result<Option<Job>, QueueError> {
        if !self.has_free_slot(store).await? {
            return Ok(None);
        }
        store.next_waiting().await
    }
}
