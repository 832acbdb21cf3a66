// Job Unit Port (Interface)

use crate::application::cancellation::CancellationToken;
use crate::domain::{
    JobArguments, JobConfigValidationError, JobExecutionError, JobId, JobInstance, JobResult,
    JobSpec, LogLevel,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Executable contract implemented by every job unit
///
/// Units are stateless aside from collaborator ports injected at
/// construction. They communicate with the scheduler only through the
/// returned value.
#[async_trait]
pub trait AsyncJob: Send + Sync {
    async fn execute(&self, ctx: &JobExecutionContext) -> Result<JobResult, JobExecutionError>;
}

/// Registration metadata for a job type
pub trait JobDefinition: AsyncJob + Sized + 'static {
    const JOB_KEY: &'static str;
    const JOB_NAME: &'static str;

    /// Specification with key, name and constraints already set
    fn base_spec() -> JobSpec {
        JobSpec::new(Self::JOB_KEY, Self::JOB_NAME)
    }

    /// Job-specific validation run at submission, after the base checks
    fn validate(spec: &JobSpec) -> Result<(), JobConfigValidationError>;
}

/// Read-only view of a running instance handed to its job unit
#[derive(Debug, Clone)]
pub struct JobExecutionContext {
    job_id: JobId,
    spec: JobSpec,
    cancellation: CancellationToken,
}

impl JobExecutionContext {
    pub fn new(job: &JobInstance, cancellation: CancellationToken) -> Self {
        Self {
            job_id: job.id.clone(),
            spec: job.spec.clone(),
            cancellation,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn job_key(&self) -> &str {
        &self.spec.job_key
    }

    pub fn job_name(&self) -> &str {
        &self.spec.job_name
    }

    pub fn arguments(&self) -> &JobArguments {
        &self.spec.arguments
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.spec.metadata
    }

    pub fn owner_key(&self) -> Option<&str> {
        self.spec.owner_key()
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        self.spec.log_level
    }

    /// Advisory: the instance was canceled while running
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once cancellation has been requested
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }
}
