//! Job scheduler - submission, status, cancellation and resubmission
//!
//! The scheduler is the single admission authority: submissions are
//! validated against the registry, then admitted one at a time through a
//! store transaction so constraint evaluation and insertion are atomic.
//! Execution is left to [`crate::application::Worker`]s sharing the store.

use crate::application::admission;
use crate::application::cancellation::CancellationRegistry;
use crate::application::registry::JobRegistry;
use crate::application::retry;
use crate::domain::{JobId, JobSpec, JobState, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, TimeProvider, TransactionalJobRepository};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Submission / Status / Cancellation facade
pub struct JobScheduler {
    registry: Arc<JobRegistry>,
    job_repo: Arc<dyn JobRepository>,
    tx_repo: Arc<dyn TransactionalJobRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    cancellations: Arc<CancellationRegistry>,
    admission_lock: Mutex<()>,
}

impl JobScheduler {
    /// Create a scheduler over a store implementing both repository ports
    pub fn new<S>(
        registry: Arc<JobRegistry>,
        store: Arc<S>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self
    where
        S: JobRepository + TransactionalJobRepository + 'static,
    {
        Self {
            registry,
            job_repo: store.clone(),
            tx_repo: store,
            id_provider,
            time_provider,
            cancellations: CancellationRegistry::new(),
            admission_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Running-instance signals shared with this scheduler's workers
    pub fn cancellations(&self) -> Arc<CancellationRegistry> {
        Arc::clone(&self.cancellations)
    }

    pub fn job_repository(&self) -> Arc<dyn JobRepository> {
        Arc::clone(&self.job_repo)
    }

    /// Validate and admit a specification
    ///
    /// # Errors
    /// - `ConfigValidation` when the spec is missing or has malformed arguments
    /// - `UnknownJobKey` when no unit is registered for the key
    /// - `ConstraintRejected` when it conflicts with queued or running work
    ///
    /// No instance exists after any of these.
    pub async fn submit(&self, spec: JobSpec) -> Result<JobId> {
        if let Err(e) = self.registry.validate(&spec) {
            warn!(job_key = %spec.job_key, error = %e, "Job specification rejected");
            return Err(e);
        }

        let _admission = self.admission_lock.lock().await;
        admission::execute(
            self.tx_repo.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            spec,
        )
        .await
    }

    pub async fn get_status(&self, job_id: &JobId) -> Result<JobStatus> {
        self.job_repo
            .find_by_id(job_id)
            .await?
            .map(|job| JobStatus::from(&job))
            .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))
    }

    /// Cancel a QUEUED or RUNNING instance
    ///
    /// Returns false when the instance is already terminal. A running unit
    /// is signalled but not interrupted; whatever it returns afterwards is
    /// discarded.
    pub async fn cancel(&self, job_id: &JobId) -> Result<bool> {
        loop {
            let mut job = self
                .job_repo
                .find_by_id(job_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))?;

            if job.state.is_terminal() {
                info!(job_id = %job_id, state = %job.state, "Cancel ignored: job already terminal");
                return Ok(false);
            }

            let expected = job.state;
            job.cancel(self.time_provider.now_millis())?;

            if self.job_repo.update_if_state(&job, expected).await? {
                if expected == JobState::Running {
                    self.cancellations.cancel(job_id);
                }
                info!(job_id = %job_id, previous_state = %expected, "Job canceled");
                return Ok(true);
            }
            // State moved underneath us (claimed or completed); re-read
        }
    }

    /// Submit a new instance from a failed or canceled instance's spec
    pub async fn resubmit(&self, job_id: &JobId) -> Result<JobId> {
        let job = self
            .job_repo
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))?;

        let spec = retry::resubmission_spec(&job)?;
        let new_id = self.submit(spec).await?;

        info!(job_id = %job_id, new_job_id = %new_id, "Job resubmitted");
        Ok(new_id)
    }

    pub async fn list_jobs(&self, state: JobState) -> Result<Vec<JobStatus>> {
        let jobs = self.job_repo.find_by_state(state).await?;
        Ok(jobs.iter().map(JobStatus::from).collect())
    }

    /// Instance count per state
    pub async fn counts_by_state(&self) -> Result<Vec<(JobState, i64)>> {
        let mut counts = Vec::with_capacity(JobState::ALL.len());
        for state in JobState::ALL {
            counts.push((state, self.job_repo.count_by_state(state).await?));
        }
        Ok(counts)
    }
}
