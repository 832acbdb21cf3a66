// Admission Use Case (constraint check + insert, atomic)

use crate::domain::{check_admission, JobId, JobInstance, JobSpec};
use crate::error::Result;
use crate::port::{IdProvider, TimeProvider, TransactionalJobRepository};
use tracing::{debug, info};

/// Admit a validated specification as a new QUEUED job instance
///
/// # Arguments
///
/// * `job_repo` - Transactional job repository
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `spec` - Specification that already passed validation
///
/// A rejected candidate leaves the store untouched.
pub async fn execute(
    job_repo: &dyn TransactionalJobRepository,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    spec: JobSpec,
) -> Result<JobId> {
    let mut tx = job_repo.begin_transaction().await?;

    // Constraint input is read inside the same transaction as the insert
    let existing = tx.find_active_by_key(&spec.job_key).await?;
    if let Err(violation) = check_admission(&spec, &existing) {
        tx.rollback().await?;
        return Err(violation.into());
    }

    let job_id = id_provider.generate_id();
    let created_at = time_provider.now_millis();

    let mut job = JobInstance::new(job_id.clone(), spec, created_at);
    job.enqueue()?;

    tx.insert(&job).await?;
    tx.commit().await?;

    debug!(active_jobs = existing.len(), "Admission check passed");
    info!(
        job_id = %job.id,
        job_key = %job.job_key(),
        owner_key = job.spec.owner_key().unwrap_or("-"),
        "Job admitted"
    );

    Ok(job_id)
}
