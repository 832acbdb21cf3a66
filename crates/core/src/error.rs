// Central Error Type for the Application

use crate::domain::{ArgumentConversionError, ConstraintViolation, JobConfigValidationError};
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Specification failed validation; no job instance was created
    #[error("Invalid job configuration: {0}")]
    ConfigValidation(#[from] JobConfigValidationError),

    /// Specification is well-formed but conflicts with queued or running work
    #[error("Job rejected by admission control: {0}")]
    ConstraintRejected(#[from] ConstraintViolation),

    #[error("Argument conversion failed: {0}")]
    ArgumentConversion(#[from] ArgumentConversionError),

    #[error("No job unit registered for job key: {0}")]
    UnknownJobKey(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in the infra-sqlite crate
// by converting to AppError::Database(String)
