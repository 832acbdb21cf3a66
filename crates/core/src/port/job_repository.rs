// Job Repository Port (Interface)

use crate::domain::{JobId, JobInstance, JobState};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for job instance persistence
///
/// Inserts only happen through [`crate::port::JobRepositoryTransaction`] so
/// that admission checks and insertion stay atomic.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Find instance by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<JobInstance>>;

    /// Atomically claim the oldest QUEUED instance (QUEUED -> RUNNING)
    ///
    /// Two concurrent callers never receive the same instance.
    async fn claim_next(&self, worker_id: &str, now_millis: i64) -> Result<Option<JobInstance>>;

    /// Compare-and-set update
    ///
    /// Persists `job` only if the stored state still equals `expected`.
    /// Returns false when another writer moved the instance first.
    async fn update_if_state(&self, job: &JobInstance, expected: JobState) -> Result<bool>;

    /// Non-terminal instances of a job key (constraint evaluation input)
    async fn find_active_by_key(&self, job_key: &str) -> Result<Vec<JobInstance>>;

    /// Find all instances by state (recovery, listing)
    async fn find_by_state(&self, state: JobState) -> Result<Vec<JobInstance>>;

    /// Count instances by state
    async fn count_by_state(&self, state: JobState) -> Result<i64>;
}
