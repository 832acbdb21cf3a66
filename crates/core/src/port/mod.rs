// Port Layer - Interfaces for external dependencies

pub mod async_job;
pub mod entitlement;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod maintenance;
pub mod memory;
pub mod time_provider;
pub mod transaction;

// Re-exports
pub use async_job::{AsyncJob, JobDefinition, JobExecutionContext};
pub use entitlement::{
    CertificateRegenRequest, CertificateRegenerator, CollaboratorError, ConsumerRef,
    EnvironmentRef, ExportRequest, ExportResult, ManifestManager, OwnerRef,
};
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use maintenance::{Maintenance, MaintenanceConfig, MaintenanceStats};
pub use memory::InMemoryJobRepository;
pub use time_provider::TimeProvider;
pub use transaction::{JobRepositoryTransaction, Transaction, TransactionalJobRepository};
