// Environment entitlement certificate regeneration job

use crate::domain::{
    JobArguments, JobConfigValidationError, JobExecutionError, JobResult, JobSpec, OWNER_KEY,
};
use crate::port::{
    AsyncJob, CertificateRegenRequest, CertificateRegenerator, EnvironmentRef, JobDefinition,
    JobExecutionContext, OwnerRef,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

const ENV_ID: &str = "env_id";
const CONTENT: &str = "content_ids";
const LAZY_REGEN: &str = "lazy_regen";

/// Regenerates entitlement certificates of an environment after its
/// content changed
pub struct RegenEnvEntitlementCertsJob {
    regenerator: Arc<dyn CertificateRegenerator>,
}

impl RegenEnvEntitlementCertsJob {
    pub fn new(regenerator: Arc<dyn CertificateRegenerator>) -> Self {
        Self { regenerator }
    }

    pub fn create_job_config() -> RegenEnvEntitlementCertsJobConfig {
        RegenEnvEntitlementCertsJobConfig::new()
    }
}

#[async_trait]
impl AsyncJob for RegenEnvEntitlementCertsJob {
    async fn execute(&self, ctx: &JobExecutionContext) -> Result<JobResult, JobExecutionError> {
        let args = ctx.arguments();

        let environment_id = args
            .get_as_string(ENV_ID)?
            .ok_or_else(|| JobExecutionError::terminal("env_id is not set"))?;
        let content_ids: BTreeSet<String> = args
            .get_as::<Vec<String>>(CONTENT)?
            .unwrap_or_default()
            .into_iter()
            .collect();
        let lazy = args.get_as_bool_or(LAZY_REGEN, true)?;

        info!(
            environment_id = %environment_id,
            content_count = content_ids.len(),
            lazy,
            "Regenerating environment entitlement certificates"
        );

        self.regenerator
            .regenerate_certificates_of(CertificateRegenRequest {
                environment_id: environment_id.clone(),
                content_ids,
                lazy,
            })
            .await
            .map_err(super::classify)?;

        Ok(Value::String(format!(
            "Successfully regenerated entitlements for environment {}",
            environment_id
        )))
    }
}

impl JobDefinition for RegenEnvEntitlementCertsJob {
    const JOB_KEY: &'static str = "REGEN_ENV_ENT_CERTS_JOB";
    const JOB_NAME: &'static str = "regen_env_entitlement_certs";

    fn validate(spec: &JobSpec) -> Result<(), JobConfigValidationError> {
        validate_arguments(&spec.arguments)
    }
}

fn validate_arguments(arguments: &JobArguments) -> Result<(), JobConfigValidationError> {
    let environment_id = arguments.get_as_string(ENV_ID)?;
    if environment_id.map_or(true, |id| id.is_empty()) {
        return Err(JobConfigValidationError::missing(
            ENV_ID,
            "environment has not been set, or the provided environment lacks an id",
        ));
    }

    let content_ids = arguments.get_as::<Vec<String>>(CONTENT)?;
    if content_ids.map_or(true, |ids| ids.is_empty()) {
        return Err(JobConfigValidationError::missing(
            CONTENT,
            "content ids have not been set",
        ));
    }

    arguments.get_as_bool(LAZY_REGEN)?;
    Ok(())
}

/// Builder for certificate regeneration specifications
#[derive(Debug, Clone)]
pub struct RegenEnvEntitlementCertsJobConfig {
    spec: JobSpec,
}

impl RegenEnvEntitlementCertsJobConfig {
    fn new() -> Self {
        Self {
            spec: RegenEnvEntitlementCertsJob::base_spec(),
        }
    }

    pub fn set_owner(mut self, owner: &OwnerRef) -> Self {
        self.spec.set_metadata(OWNER_KEY, owner.key.as_str());
        self.spec.log_level = owner.log_level;
        self
    }

    pub fn set_environment(mut self, environment: &EnvironmentRef) -> Self {
        self.spec.arguments.set(ENV_ID, environment.id.as_str());
        self
    }

    /// Stored as a sorted, de-duplicated sequence
    pub fn set_content<I, S>(mut self, content_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = content_ids.into_iter().map(Into::into).collect();
        self.spec
            .arguments
            .set(CONTENT, ids.into_iter().map(Value::String).collect::<Vec<_>>());
        self
    }

    /// false regenerates immediately; true marks certificates dirty
    pub fn set_lazy_regeneration(mut self, lazy: bool) -> Self {
        self.spec.arguments.set(LAZY_REGEN, lazy);
        self
    }

    pub fn set_log_execution_details(mut self, enabled: bool) -> Self {
        self.spec.log_execution_details = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), JobConfigValidationError> {
        self.spec.validate_base()?;
        RegenEnvEntitlementCertsJob::validate(&self.spec)
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn into_spec(self) -> JobSpec {
        self.spec
    }
}

impl From<RegenEnvEntitlementCertsJobConfig> for JobSpec {
    fn from(config: RegenEnvEntitlementCertsJobConfig) -> Self {
        config.into_spec()
    }
}
