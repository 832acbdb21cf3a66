// In-memory job store (tests, embedded use)
//
// One arena behind an async mutex. A transaction holds the lock until it
// commits or is dropped, so admission check + insert is atomic.

use crate::domain::{JobId, JobInstance, JobState};
use crate::error::{AppError, Result};
use crate::port::job_repository::JobRepository;
use crate::port::maintenance::{Maintenance, MaintenanceStats};
use crate::port::time_provider::{SystemTimeProvider, TimeProvider};
use crate::port::transaction::{
    JobRepositoryTransaction, Transaction, TransactionalJobRepository,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Default)]
struct Arena {
    jobs: HashMap<JobId, JobInstance>,
    /// Insertion order (FIFO claiming)
    order: Vec<JobId>,
}

impl Arena {
    fn active_by_key(&self, job_key: &str) -> Vec<JobInstance> {
        self.ordered()
            .filter(|job| job.job_key() == job_key && !job.state.is_terminal())
            .cloned()
            .collect()
    }

    fn ordered(&self) -> impl Iterator<Item = &JobInstance> {
        self.order.iter().filter_map(|id| self.jobs.get(id))
    }

    fn insert(&mut self, job: JobInstance) -> Result<()> {
        if self.jobs.contains_key(&job.id) {
            return Err(AppError::Database(format!("duplicate job id: {}", job.id)));
        }
        self.order.push(job.id.clone());
        self.jobs.insert(job.id.clone(), job);
        Ok(())
    }
}

/// Job store backed by process memory
#[derive(Clone)]
pub struct InMemoryJobRepository {
    arena: Arc<Mutex<Arena>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Default for InMemoryJobRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::with_time_provider(Arc::new(SystemTimeProvider))
    }

    /// Clock used for retention cutoffs
    pub fn with_time_provider(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            arena: Arc::new(Mutex::new(Arena::default())),
            time_provider,
        }
    }

    /// Insert outside of admission control (fixtures)
    pub async fn insert(&self, job: &JobInstance) -> Result<()> {
        self.arena.lock().await.insert(job.clone())
    }

    pub async fn len(&self) -> usize {
        self.arena.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn find_by_id(&self, id: &JobId) -> Result<Option<JobInstance>> {
        Ok(self.arena.lock().await.jobs.get(id).cloned())
    }

    async fn claim_next(&self, worker_id: &str, now_millis: i64) -> Result<Option<JobInstance>> {
        let mut arena = self.arena.lock().await;

        let next_id = arena
            .ordered()
            .find(|job| job.state == JobState::Queued)
            .map(|job| job.id.clone());

        let Some(id) = next_id else {
            return Ok(None);
        };

        let job = arena
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::Internal(format!("arena lost job {}", id)))?;
        job.start(now_millis, worker_id)?;
        Ok(Some(job.clone()))
    }

    async fn update_if_state(&self, job: &JobInstance, expected: JobState) -> Result<bool> {
        let mut arena = self.arena.lock().await;

        let stored = arena
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", job.id)))?;

        if stored.state != expected {
            return Ok(false);
        }
        *stored = job.clone();
        Ok(true)
    }

    async fn find_active_by_key(&self, job_key: &str) -> Result<Vec<JobInstance>> {
        Ok(self.arena.lock().await.active_by_key(job_key))
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<JobInstance>> {
        let arena = self.arena.lock().await;
        Ok(arena.ordered().filter(|job| job.state == state).cloned().collect())
    }

    async fn count_by_state(&self, state: JobState) -> Result<i64> {
        let arena = self.arena.lock().await;
        Ok(arena.jobs.values().filter(|job| job.state == state).count() as i64)
    }
}

/// Transaction holding the arena lock
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Arena>,
    staged: Vec<JobInstance>,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction { mut guard, staged } = *self;
        for job in staged {
            guard.insert(job)?;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl JobRepositoryTransaction for InMemoryTransaction {
    async fn find_active_by_key(&mut self, job_key: &str) -> Result<Vec<JobInstance>> {
        let mut active = self.guard.active_by_key(job_key);
        active.extend(
            self.staged
                .iter()
                .filter(|job| job.job_key() == job_key && !job.state.is_terminal())
                .cloned(),
        );
        Ok(active)
    }

    async fn insert(&mut self, job: &JobInstance) -> Result<()> {
        if self.guard.jobs.contains_key(&job.id) || self.staged.iter().any(|s| s.id == job.id) {
            return Err(AppError::Database(format!("duplicate job id: {}", job.id)));
        }
        self.staged.push(job.clone());
        Ok(())
    }
}

#[async_trait]
impl TransactionalJobRepository for InMemoryJobRepository {
    async fn begin_transaction(&self) -> Result<Box<dyn JobRepositoryTransaction>> {
        let guard = self.arena.clone().lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            guard,
            staged: Vec::new(),
        }))
    }
}

#[async_trait]
impl Maintenance for InMemoryJobRepository {
    async fn vacuum(&self) -> Result<f64> {
        Ok(0.0)
    }

    async fn purge_terminal_jobs(&self, retention_days: i64) -> Result<i64> {
        let cutoff = self
            .time_provider
            .now_millis()
            .saturating_sub(retention_days.saturating_mul(MILLIS_PER_DAY));
        let mut arena = self.arena.lock().await;

        let expired: Vec<JobId> = arena
            .jobs
            .values()
            .filter(|job| job.state.is_terminal())
            .filter(|job| job.finished_at.unwrap_or(job.created_at) < cutoff)
            .map(|job| job.id.clone())
            .collect();

        for id in &expired {
            arena.jobs.remove(id);
        }
        arena.order.retain(|id| !expired.contains(id));

        Ok(expired.len() as i64)
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let arena = self.arena.lock().await;
        let terminal = arena
            .jobs
            .values()
            .filter(|job| job.state.is_terminal())
            .count();

        Ok(MaintenanceStats {
            db_size_mb: 0.0,
            db_size_bytes: 0,
            job_count: arena.jobs.len() as i64,
            terminal_job_count: terminal as i64,
            fragmentation_percent: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobFailure, JobSpec};
    use crate::port::time_provider::mocks::ManualTimeProvider;

    fn queued(id: &str, created_at: i64) -> JobInstance {
        let mut job = JobInstance::new(id, JobSpec::new("EXPORT_JOB", "export_manifest"), created_at);
        job.enqueue().unwrap();
        job
    }

    #[tokio::test]
    async fn test_claim_next_is_fifo_and_exclusive() {
        let repo = InMemoryJobRepository::new();
        repo.insert(&queued("job-1", 1000)).await.unwrap();
        repo.insert(&queued("job-2", 2000)).await.unwrap();

        let first = repo.claim_next("w-1", 3000).await.unwrap().unwrap();
        let second = repo.claim_next("w-2", 3000).await.unwrap().unwrap();
        assert_eq!(first.id, "job-1");
        assert_eq!(second.id, "job-2");
        assert_eq!(first.state, JobState::Running);
        assert!(repo.claim_next("w-3", 3000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_if_state_rejects_stale_writer() {
        let repo = InMemoryJobRepository::new();
        repo.insert(&queued("job-1", 1000)).await.unwrap();
        let mut running = repo.claim_next("w-1", 2000).await.unwrap().unwrap();

        let mut canceled = running.clone();
        canceled.cancel(2500).unwrap();
        assert!(repo.update_if_state(&canceled, JobState::Running).await.unwrap());

        running.fail(3000, JobFailure::terminal("late")).unwrap();
        assert!(!repo.update_if_state(&running, JobState::Running).await.unwrap());

        let stored = repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Canceled);
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() {
        let repo = InMemoryJobRepository::new();

        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert(&queued("job-1", 1000)).await.unwrap();
        assert_eq!(tx.find_active_by_key("EXPORT_JOB").await.unwrap().len(), 1);
        tx.rollback().await.unwrap();
        assert!(repo.is_empty().await);

        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert(&queued("job-1", 1000)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(repo.find_active_by_key("EXPORT_JOB").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_keeps_active_and_recent_jobs() {
        let clock = Arc::new(ManualTimeProvider::new(0));
        let repo = InMemoryJobRepository::with_time_provider(clock.clone());

        let mut old = queued("job-old", 0);
        old.start(10, "w-1").unwrap();
        old.finish(20, serde_json::json!(null)).unwrap();
        repo.insert(&old).await.unwrap();
        repo.insert(&queued("job-active", 0)).await.unwrap();

        clock.advance(8 * MILLIS_PER_DAY);
        let mut recent = queued("job-recent", clock.now_millis());
        recent.cancel(clock.now_millis()).unwrap();
        repo.insert(&recent).await.unwrap();

        assert_eq!(repo.purge_terminal_jobs(7).await.unwrap(), 1);
        assert_eq!(repo.len().await, 2);
        assert!(repo.find_by_id(&"job-old".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_with_unbounded_retention_keeps_everything() {
        let clock = Arc::new(ManualTimeProvider::new(0));
        let repo = InMemoryJobRepository::with_time_provider(clock.clone());

        let mut old = queued("job-old", 0);
        old.cancel(10).unwrap();
        repo.insert(&old).await.unwrap();
        clock.advance(8 * MILLIS_PER_DAY);

        assert_eq!(repo.purge_terminal_jobs(i64::MAX).await.unwrap(), 0);
        assert_eq!(repo.len().await, 1);
    }
}
