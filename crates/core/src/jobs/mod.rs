//! Entitlement job units
//!
//! Each unit pairs an [`AsyncJob`](crate::port::AsyncJob) implementation
//! with a config builder producing a ready-to-submit [`JobSpec`](crate::domain::JobSpec).

pub mod export;
pub mod regen_env_certs;

pub use export::{ExportJob, ExportJobConfig};
pub use regen_env_certs::{RegenEnvEntitlementCertsJob, RegenEnvEntitlementCertsJobConfig};

use crate::application::JobRegistry;
use crate::domain::JobExecutionError;
use crate::error::Result;
use crate::port::{CertificateRegenerator, CollaboratorError, ManifestManager};
use std::sync::Arc;

/// Register every entitlement job type against its collaborators
pub fn register_entitlement_jobs(
    registry: &mut JobRegistry,
    manifests: Arc<dyn ManifestManager>,
    certificates: Arc<dyn CertificateRegenerator>,
) -> Result<()> {
    registry.register(move || ExportJob::new(Arc::clone(&manifests)))?;
    registry.register(move || RegenEnvEntitlementCertsJob::new(Arc::clone(&certificates)))?;
    Ok(())
}

/// Transient collaborator failures are retryable, everything else is terminal
fn classify(err: CollaboratorError) -> JobExecutionError {
    let retryable = err.is_transient();
    JobExecutionError::new(err.to_string(), retryable).with_source(err)
}
