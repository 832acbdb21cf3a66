// Crash recovery for instances orphaned in RUNNING
use crate::domain::{JobFailure, JobInstance, JobState};
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;

const ORPHANED_MESSAGE: &str = "job was interrupted by a daemon restart";

/// Crash recovery service
///
/// On daemon startup, RUNNING instances whose worker is gone are moved to
/// FAILED with retryable=true. They are never put back in QUEUED; callers
/// resubmit them as new instances.
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `job_repo` - Job repository
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Optional custom recovery window (default: 5 minutes)
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            job_repo,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Fail RUNNING instances started before `now - recovery_window`
    ///
    /// # Returns
    /// Number of instances recovered
    pub async fn recover_orphaned_jobs(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.recovery_window_ms;

        info!(
            cutoff_time = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting orphaned job recovery"
        );

        let running_jobs = self.job_repo.find_by_state(JobState::Running).await?;
        let mut recovered_count = 0;

        for job in running_jobs {
            match job.started_at {
                Some(started_at) if started_at >= cutoff => continue,
                Some(started_at) => {
                    info!(
                        job_id = %job.id,
                        started_at = %started_at,
                        worker_id = job.worker_id.as_deref().unwrap_or("-"),
                        "Recovering orphaned job"
                    );
                }
                None => {
                    warn!(job_id = %job.id, "RUNNING job without started_at, marking as FAILED");
                }
            }

            if self.fail_orphan(job, now).await? {
                recovered_count += 1;
            }
        }

        info!(recovered_count = %recovered_count, "Orphaned job recovery complete");
        Ok(recovered_count)
    }

    async fn fail_orphan(&self, mut job: JobInstance, now: i64) -> crate::error::Result<bool> {
        job.fail(
            now,
            JobFailure {
                message: ORPHANED_MESSAGE.to_string(),
                retryable: true,
                cause: None,
            },
        )?;
        self.job_repo.update_if_state(&job, JobState::Running).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobSpec;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use crate::port::InMemoryJobRepository;

    async fn running(repo: &InMemoryJobRepository, id: &str, started_at: i64) {
        let mut job = JobInstance::new(id, JobSpec::new("EXPORT_JOB", "export_manifest"), 0);
        job.enqueue().unwrap();
        job.start(started_at, "w-dead").unwrap();
        repo.insert(&job).await.unwrap();
    }

    #[tokio::test]
    async fn test_only_stale_running_jobs_recovered() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let now = 10 * DEFAULT_RECOVERY_WINDOW_MS;
        running(&repo, "stale", 0).await;
        running(&repo, "fresh", now - 1000).await;

        let recovery = RecoveryService::new(
            repo.clone(),
            Arc::new(ManualTimeProvider::new(now)),
            None,
        );
        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 1);

        let stale = repo.find_by_id(&"stale".to_string()).await.unwrap().unwrap();
        assert_eq!(stale.state, JobState::Failed);
        assert!(stale.failure().unwrap().retryable);

        let fresh = repo.find_by_id(&"fresh".to_string()).await.unwrap().unwrap();
        assert_eq!(fresh.state, JobState::Running);
    }

    #[tokio::test]
    async fn test_custom_window() {
        let repo = Arc::new(InMemoryJobRepository::new());
        running(&repo, "job-1", 900).await;

        let recovery = RecoveryService::new(
            repo.clone(),
            Arc::new(ManualTimeProvider::new(1000)),
            Some(50),
        );
        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 1);
    }
}
