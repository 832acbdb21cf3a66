//! Job registry - dispatch table keyed by job key
//!
//! Every job type the engine can run is registered once at startup with a
//! factory producing its unit. Submission validates against the registered
//! validator; workers instantiate through the factory.

use crate::domain::{JobConfigValidationError, JobKey, JobSpec};
use crate::error::{AppError, Result};
use crate::port::{AsyncJob, JobDefinition};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

type JobFactory = Box<dyn Fn() -> Arc<dyn AsyncJob> + Send + Sync>;
type JobValidator = fn(&JobSpec) -> std::result::Result<(), JobConfigValidationError>;

struct Registration {
    job_name: &'static str,
    factory: JobFactory,
    validator: JobValidator,
    base_spec: fn() -> JobSpec,
}

/// Job key -> unit factory + validator
#[derive(Default)]
pub struct JobRegistry {
    registrations: BTreeMap<JobKey, Registration>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job type
    ///
    /// Registering the same job key twice is a configuration error.
    pub fn register<J, F>(&mut self, factory: F) -> Result<()>
    where
        J: JobDefinition,
        F: Fn() -> J + Send + Sync + 'static,
    {
        if self.registrations.contains_key(J::JOB_KEY) {
            return Err(AppError::Config(format!(
                "job key already registered: {}",
                J::JOB_KEY
            )));
        }

        self.registrations.insert(
            J::JOB_KEY.to_string(),
            Registration {
                job_name: J::JOB_NAME,
                factory: Box::new(move || Arc::new(factory()) as Arc<dyn AsyncJob>),
                validator: J::validate,
                base_spec: J::base_spec,
            },
        );

        debug!(job_key = J::JOB_KEY, job_name = J::JOB_NAME, "Job type registered");
        Ok(())
    }

    pub fn is_registered(&self, job_key: &str) -> bool {
        self.registrations.contains_key(job_key)
    }

    pub fn job_keys(&self) -> impl Iterator<Item = &str> {
        self.registrations.keys().map(String::as_str)
    }

    pub fn job_name(&self, job_key: &str) -> Option<&'static str> {
        self.registrations.get(job_key).map(|r| r.job_name)
    }

    /// Base checks, then the job type's own validator
    pub fn validate(&self, spec: &JobSpec) -> Result<()> {
        spec.validate_base()?;
        let registration = self.lookup(&spec.job_key)?;
        (registration.validator)(spec)?;
        Ok(())
    }

    /// Build a fresh unit for one execution
    pub fn instantiate(&self, job_key: &str) -> Result<Arc<dyn AsyncJob>> {
        Ok((self.lookup(job_key)?.factory)())
    }

    /// Key, name and constraints of a registered type (generic submission)
    pub fn base_spec(&self, job_key: &str) -> Result<JobSpec> {
        Ok((self.lookup(job_key)?.base_spec)())
    }

    fn lookup(&self, job_key: &str) -> Result<&Registration> {
        self.registrations
            .get(job_key)
            .ok_or_else(|| AppError::UnknownJobKey(job_key.to_string()))
    }
}
