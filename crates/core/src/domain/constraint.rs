//! Admission constraints
//!
//! A constraint is a pure predicate over a candidate specification and the
//! instances currently known to the store. Constraints attached to a
//! specification are AND-combined: the first one that reports conflicts
//! rejects the candidate.

use crate::domain::job::{JobId, JobInstance};
use crate::domain::spec::JobSpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Admission predicate attached to a job specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobConstraint {
    /// Reject while a non-terminal instance of the same job key carries
    /// identical values for every named argument
    UniqueByArguments { arguments: Vec<String> },
}

impl JobConstraint {
    pub fn unique_by_argument(name: impl Into<String>) -> Self {
        JobConstraint::UniqueByArguments {
            arguments: vec![name.into()],
        }
    }

    pub fn unique_by_arguments<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        JobConstraint::UniqueByArguments {
            arguments: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Ids of existing instances the candidate conflicts with (empty = admit)
    pub fn conflicts(&self, candidate: &JobSpec, existing: &[JobInstance]) -> Vec<JobId> {
        match self {
            JobConstraint::UniqueByArguments { arguments } => existing
                .iter()
                .filter(|job| !job.state.is_terminal())
                .filter(|job| job.spec.job_key == candidate.job_key)
                .filter(|job| {
                    arguments.iter().all(|name| {
                        job.spec.arguments.get_raw(name) == candidate.arguments.get_raw(name)
                    })
                })
                .map(|job| job.id.clone())
                .collect(),
        }
    }
}

impl std::fmt::Display for JobConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobConstraint::UniqueByArguments { arguments } => {
                write!(f, "unique_by_arguments({})", arguments.join(", "))
            }
        }
    }
}

/// Candidate is well-formed but conflicts with queued or running work
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("job '{job_key}' violates constraint {constraint}; conflicting jobs: {}", .conflicting.join(", "))]
pub struct ConstraintViolation {
    pub job_key: String,
    pub constraint: JobConstraint,
    pub conflicting: Vec<JobId>,
}

/// Evaluate every constraint of `candidate` against `existing`
pub fn check_admission(
    candidate: &JobSpec,
    existing: &[JobInstance],
) -> Result<(), ConstraintViolation> {
    for constraint in &candidate.constraints {
        let conflicting = constraint.conflicts(candidate, existing);
        if !conflicting.is_empty() {
            debug!(
                job_key = %candidate.job_key,
                constraint = %constraint,
                conflicts = conflicting.len(),
                "Constraint rejected candidate"
            );
            return Err(ConstraintViolation {
                job_key: candidate.job_key.clone(),
                constraint: constraint.clone(),
                conflicting,
            });
        }
    }
    Ok(())
}
