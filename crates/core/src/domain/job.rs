// Job Instance Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::failure::JobFailure;
use crate::domain::spec::JobSpec;
use serde::{Deserialize, Serialize};

/// Job instance ID (UUID v4), distinct from the job key
pub type JobId = String;

/// Opaque, serializable value returned by a job unit
pub type JobResult = serde_json::Value;

/// Job instance state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Created,
    Queued,
    Running,
    Finished,
    Failed,
    Canceled,
}

impl JobState {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Finished | JobState::Failed | JobState::Canceled
        )
    }

    pub const ALL: [JobState; 6] = [
        JobState::Created,
        JobState::Queued,
        JobState::Running,
        JobState::Finished,
        JobState::Failed,
        JobState::Canceled,
    ];
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Created => write!(f, "CREATED"),
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Finished => write!(f, "FINISHED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Canceled => write!(f, "CANCELED"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        JobState::ALL
            .into_iter()
            .find(|state| state.to_string() == s)
            .ok_or_else(|| DomainError::UnknownState(s.to_string()))
    }
}

/// Outcome of a completed execution (result and failure are exclusive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed(JobResult),
    Failed(JobFailure),
}

/// Job Instance - one admitted, trackable occurrence of a job key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: JobId,
    /// Snapshot of the admitted specification
    pub spec: JobSpec,
    pub state: JobState,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    /// Worker that claimed the instance
    pub worker_id: Option<String>,
    pub cancel_requested: bool,
    pub outcome: Option<JobOutcome>,
}

impl JobInstance {
    /// Create a new instance in CREATED state
    ///
    /// # Arguments
    ///
    /// * `id` - Unique instance ID (injected, not generated)
    /// * `spec` - Validated and admitted specification
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(id: impl Into<String>, spec: JobSpec, created_at: i64) -> Self {
        Self {
            id: id.into(),
            spec,
            state: JobState::Created,
            created_at,
            started_at: None,
            finished_at: None,
            worker_id: None,
            cancel_requested: false,
            outcome: None,
        }
    }

    pub fn job_key(&self) -> &str {
        &self.spec.job_key
    }

    pub fn result(&self) -> Option<&JobResult> {
        match &self.outcome {
            Some(JobOutcome::Completed(result)) => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match &self.outcome {
            Some(JobOutcome::Failed(failure)) => Some(failure),
            _ => None,
        }
    }

    fn transition(&mut self, allowed_from: &[JobState], to: JobState) -> Result<()> {
        if !allowed_from.contains(&self.state) {
            return Err(DomainError::InvalidStateTransition {
                job_id: self.id.clone(),
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// CREATED -> QUEUED (immediately after admission)
    pub fn enqueue(&mut self) -> Result<()> {
        self.transition(&[JobState::Created], JobState::Queued)
    }

    /// QUEUED -> RUNNING (claimed by a worker)
    pub fn start(&mut self, now_millis: i64, worker_id: impl Into<String>) -> Result<()> {
        self.transition(&[JobState::Queued], JobState::Running)?;
        self.started_at = Some(now_millis);
        self.worker_id = Some(worker_id.into());
        Ok(())
    }

    /// RUNNING -> FINISHED with the unit's result attached
    pub fn finish(&mut self, now_millis: i64, result: JobResult) -> Result<()> {
        self.transition(&[JobState::Running], JobState::Finished)?;
        self.finished_at = Some(now_millis);
        self.outcome = Some(JobOutcome::Completed(result));
        Ok(())
    }

    /// RUNNING -> FAILED with the classified failure attached
    pub fn fail(&mut self, now_millis: i64, failure: JobFailure) -> Result<()> {
        self.transition(&[JobState::Running], JobState::Failed)?;
        self.finished_at = Some(now_millis);
        self.outcome = Some(JobOutcome::Failed(failure));
        Ok(())
    }

    /// QUEUED | RUNNING -> CANCELED
    pub fn cancel(&mut self, now_millis: i64) -> Result<()> {
        self.transition(&[JobState::Queued, JobState::Running], JobState::Canceled)?;
        self.finished_at = Some(now_millis);
        self.cancel_requested = true;
        Ok(())
    }
}

/// Status view returned by the status API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub job_key: String,
    pub job_name: String,
    pub state: JobState,
    pub owner_key: Option<String>,
    pub result: Option<JobResult>,
    pub failure: Option<JobFailure>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl From<&JobInstance> for JobStatus {
    fn from(job: &JobInstance) -> Self {
        Self {
            job_id: job.id.clone(),
            job_key: job.spec.job_key.clone(),
            job_name: job.spec.job_name.clone(),
            state: job.state,
            owner_key: job.spec.owner_key().map(str::to_string),
            result: job.result().cloned(),
            failure: job.failure().cloned(),
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}
