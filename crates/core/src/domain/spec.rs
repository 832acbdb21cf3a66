// Job Specification - declarative descriptor handed to the scheduler

use crate::domain::arguments::{ArgumentConversionError, JobArguments};
use crate::domain::constraint::JobConstraint;
use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

/// Metadata key carrying the owning organization
pub const OWNER_KEY: &str = "owner_key";

/// Job key (stable identifier of a job type)
pub type JobKey = String;

/// Logging verbosity requested for a job's execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(DomainError::InvalidLogLevel(s.to_string())),
        }
    }
}

/// Raised when a specification is missing or carries a malformed argument
#[derive(Error, Debug)]
pub enum JobConfigValidationError {
    #[error("job key has not been set")]
    MissingJobKey,

    #[error("job name has not been set")]
    MissingJobName,

    #[error("required argument '{argument}' is missing: {reason}")]
    MissingArgument {
        argument: &'static str,
        reason: String,
    },

    #[error("argument '{argument}' is invalid: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    #[error("one or more required arguments are of the wrong type: {0}")]
    WrongArgumentType(#[from] ArgumentConversionError),
}

impl JobConfigValidationError {
    /// Name of the argument the failure refers to, if any
    pub fn argument(&self) -> Option<&str> {
        match self {
            JobConfigValidationError::MissingArgument { argument, .. }
            | JobConfigValidationError::InvalidArgument { argument, .. } => Some(*argument),
            JobConfigValidationError::WrongArgumentType(e) => Some(e.name()),
            JobConfigValidationError::MissingJobKey | JobConfigValidationError::MissingJobName => {
                None
            }
        }
    }

    pub fn missing(argument: &'static str, reason: impl Into<String>) -> Self {
        JobConfigValidationError::MissingArgument {
            argument,
            reason: reason.into(),
        }
    }
}

/// Job Specification
///
/// Built by job-specific configs (see `crate::jobs`) and submitted to the
/// scheduler. The scheduler snapshots it into the job instance on admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_key: JobKey,
    pub job_name: String,
    pub arguments: JobArguments,
    pub constraints: Vec<JobConstraint>,
    pub metadata: BTreeMap<String, String>,
    pub log_level: Option<LogLevel>,
    #[serde(default)]
    pub log_execution_details: bool,
}

impl JobSpec {
    pub fn new(job_key: impl Into<String>, job_name: impl Into<String>) -> Self {
        Self {
            job_key: job_key.into(),
            job_name: job_name.into(),
            arguments: JobArguments::new(),
            constraints: Vec::new(),
            metadata: BTreeMap::new(),
            log_level: None,
            log_execution_details: false,
        }
    }

    pub fn with_constraint(mut self, constraint: JobConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn owner_key(&self) -> Option<&str> {
        self.metadata.get(OWNER_KEY).map(String::as_str)
    }

    /// Checks shared by every job type (key and name present)
    pub fn validate_base(&self) -> Result<(), JobConfigValidationError> {
        if self.job_key.trim().is_empty() {
            return Err(JobConfigValidationError::MissingJobKey);
        }
        if self.job_name.trim().is_empty() {
            return Err(JobConfigValidationError::MissingJobName);
        }
        Ok(())
    }
}
