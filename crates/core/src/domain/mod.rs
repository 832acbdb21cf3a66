// Domain Layer - Pure business logic and entities

pub mod arguments;
pub mod constraint;
pub mod error;
pub mod failure;
pub mod job;
pub mod spec;

// Re-exports
pub use arguments::{ArgumentConversionError, ArgumentKind, JobArguments};
pub use constraint::{check_admission, ConstraintViolation, JobConstraint};
pub use error::DomainError;
pub use failure::{JobExecutionError, JobFailure};
pub use job::{JobId, JobInstance, JobOutcome, JobResult, JobState, JobStatus};
pub use spec::{JobConfigValidationError, JobKey, JobSpec, LogLevel, OWNER_KEY};
