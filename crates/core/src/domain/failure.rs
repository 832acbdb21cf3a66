// Execution failures raised by job units and recorded on job instances

use serde::{Deserialize, Serialize};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classified failure raised by a job unit while RUNNING
///
/// `retryable` is asserted by the job unit author: true means an equivalent
/// specification may be resubmitted safely, false means the failure is
/// terminal for these inputs.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct JobExecutionError {
    message: String,
    retryable: bool,
    #[source]
    source: Option<BoxError>,
}

impl JobExecutionError {
    pub fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            retryable,
            source: None,
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(message, true)
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::new(message, false)
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Wrap an unclassified error: non-retryable, original kept as the cause
    pub fn unclassified<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::terminal(err.to_string()).with_source(err)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<serde_json::Error> for JobExecutionError {
    fn from(err: serde_json::Error) -> Self {
        JobExecutionError::unclassified(err)
    }
}

impl From<crate::domain::ArgumentConversionError> for JobExecutionError {
    fn from(err: crate::domain::ArgumentConversionError) -> Self {
        JobExecutionError::unclassified(err)
    }
}

/// Persisted form of an execution failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub message: String,
    pub retryable: bool,
    pub cause: Option<String>,
}

impl JobFailure {
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            cause: None,
        }
    }
}

impl From<&JobExecutionError> for JobFailure {
    fn from(err: &JobExecutionError) -> Self {
        use std::error::Error;

        Self {
            message: err.message.clone(),
            retryable: err.retryable,
            cause: err.source().map(|cause| cause.to_string()),
        }
    }
}
