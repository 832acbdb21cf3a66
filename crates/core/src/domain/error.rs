// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Any move outside the lifecycle graph, including out of a terminal state
    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidStateTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("Unknown job state: {0}")]
    UnknownState(String),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
