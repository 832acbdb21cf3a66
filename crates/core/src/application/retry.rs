// Resubmission policy
//
// A retry is always a new job instance built from the same specification.
// Terminal instances are never moved back to QUEUED.
use crate::domain::{JobInstance, JobSpec, JobState};
use crate::error::{AppError, Result};
use tracing::{info, warn};

/// Resubmission decision
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Same specification may be submitted again
    Resubmit,
    /// Resubmission refused, with reason
    Refused(String),
}

/// Decide whether an instance may be resubmitted
///
/// - FAILED with retryable=true: allowed
/// - CANCELED: allowed (the work never completed)
/// - FAILED with retryable=false: refused, the same inputs fail again
/// - FINISHED or non-terminal: refused
pub fn decide(job: &JobInstance) -> RetryDecision {
    match job.state {
        JobState::Failed => match job.failure() {
            Some(failure) if failure.retryable => RetryDecision::Resubmit,
            _ => RetryDecision::Refused("job failed with a non-retryable error".to_string()),
        },
        JobState::Canceled => RetryDecision::Resubmit,
        JobState::Finished => RetryDecision::Refused("job already finished".to_string()),
        state => RetryDecision::Refused(format!("job is still {}", state)),
    }
}

/// Specification to submit for a retry of `job`
pub fn resubmission_spec(job: &JobInstance) -> Result<JobSpec> {
    match decide(job) {
        RetryDecision::Resubmit => {
            info!(job_id = %job.id, job_key = %job.job_key(), "Job eligible for resubmission");
            Ok(job.spec.clone())
        }
        RetryDecision::Refused(reason) => {
            warn!(job_id = %job.id, state = %job.state, reason = %reason, "Resubmission refused");
            Err(AppError::InvalidState(format!(
                "Job {} cannot be resubmitted: {}",
                job.id, reason
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobFailure;

    fn running() -> JobInstance {
        let mut job = JobInstance::new("job-1", JobSpec::new("EXPORT_JOB", "export_manifest"), 0);
        job.enqueue().unwrap();
        job.start(1, "w-1").unwrap();
        job
    }

    #[test]
    fn test_retryable_failure_can_be_resubmitted() {
        let mut job = running();
        job.fail(
            2,
            JobFailure {
                message: "busy".to_string(),
                retryable: true,
                cause: None,
            },
        )
        .unwrap();

        assert_eq!(decide(&job), RetryDecision::Resubmit);
        assert_eq!(resubmission_spec(&job).unwrap(), job.spec);
    }

    #[test]
    fn test_terminal_failure_is_refused() {
        let mut job = running();
        job.fail(2, JobFailure::terminal("bad input")).unwrap();

        assert!(matches!(decide(&job), RetryDecision::Refused(_)));
        assert!(matches!(resubmission_spec(&job), Err(AppError::InvalidState(_))));
    }

    #[test]
    fn test_finished_and_active_are_refused() {
        let mut job = running();
        assert!(matches!(decide(&job), RetryDecision::Refused(_)));

        job.finish(2, serde_json::json!({})).unwrap();
        assert!(matches!(decide(&job), RetryDecision::Refused(_)));
    }

    #[test]
    fn test_canceled_can_be_resubmitted() {
        let mut job = running();
        job.cancel(2).unwrap();
        assert_eq!(decide(&job), RetryDecision::Resubmit);
    }
}
