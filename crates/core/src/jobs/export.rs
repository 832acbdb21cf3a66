// Manifest export job
//
// Generates and stores a manifest for a consumer. The job result carries
// the stored export reference used to download it.

use crate::domain::{
    JobArguments, JobConfigValidationError, JobConstraint, JobExecutionError, JobResult, JobSpec,
    OWNER_KEY,
};
use crate::port::{
    AsyncJob, ConsumerRef, ExportRequest, JobDefinition, JobExecutionContext, ManifestManager,
    OwnerRef,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

const CONSUMER_KEY: &str = "consumer_uuid";
const CDN_LABEL: &str = "cdn_label";
const WEBAPP_PREFIX: &str = "webapp_prefix";
const API_URL: &str = "api_url";
const EXTENSION_DATA: &str = "extension_data";

pub struct ExportJob {
    manifest_manager: Arc<dyn ManifestManager>,
}

impl ExportJob {
    pub fn new(manifest_manager: Arc<dyn ManifestManager>) -> Self {
        Self { manifest_manager }
    }

    pub fn create_job_config() -> ExportJobConfig {
        ExportJobConfig::new()
    }
}

#[async_trait]
impl AsyncJob for ExportJob {
    async fn execute(&self, ctx: &JobExecutionContext) -> Result<JobResult, JobExecutionError> {
        let args = ctx.arguments();

        let consumer_uuid = args
            .get_as_string(CONSUMER_KEY)?
            .ok_or_else(|| JobExecutionError::terminal("consumer_uuid is not set"))?;
        let cdn_label = args
            .get_as_string(CDN_LABEL)?
            .ok_or_else(|| JobExecutionError::terminal("cdn_label is not set"))?;

        let request = ExportRequest {
            consumer_uuid,
            cdn_label,
            webapp_prefix: args.get_as_string(WEBAPP_PREFIX)?,
            api_url: args.get_as_string(API_URL)?,
            extension_data: args
                .get_as::<BTreeMap<String, String>>(EXTENSION_DATA)?
                .unwrap_or_default(),
        };

        info!(consumer_uuid = %request.consumer_uuid, "Starting async export");
        let result = self
            .manifest_manager
            .generate_and_store_manifest(request)
            .await
            .map_err(super::classify)?;
        info!(export_id = %result.export_id, "Async export complete");

        Ok(serde_json::to_value(result)?)
    }
}

impl JobDefinition for ExportJob {
    const JOB_KEY: &'static str = "EXPORT_JOB";
    const JOB_NAME: &'static str = "export_manifest";

    fn base_spec() -> JobSpec {
        JobSpec::new(Self::JOB_KEY, Self::JOB_NAME)
            .with_constraint(JobConstraint::unique_by_argument(CONSUMER_KEY))
    }

    fn validate(spec: &JobSpec) -> Result<(), JobConfigValidationError> {
        validate_arguments(&spec.arguments)
    }
}

fn validate_arguments(arguments: &JobArguments) -> Result<(), JobConfigValidationError> {
    let consumer_uuid = match arguments.get_as_string(CONSUMER_KEY)? {
        Some(uuid) if !uuid.is_empty() => uuid,
        _ => {
            return Err(JobConfigValidationError::missing(
                CONSUMER_KEY,
                "consumer has not been set, or the provided consumer lacks a UUID",
            ))
        }
    };
    if !is_plain_identifier(&consumer_uuid) {
        return Err(JobConfigValidationError::InvalidArgument {
            argument: CONSUMER_KEY,
            reason: format!("'{}' is not a valid consumer UUID", consumer_uuid),
        });
    }

    let cdn_label = arguments.get_as_string(CDN_LABEL)?;
    if cdn_label.map_or(true, |label| label.is_empty()) {
        return Err(JobConfigValidationError::missing(
            CDN_LABEL,
            "CDN label has not been set, or the provided label is empty",
        ));
    }

    // Optional, but must be a flat string map when present
    arguments.get_as::<BTreeMap<String, String>>(EXTENSION_DATA)?;
    arguments.get_as_string(WEBAPP_PREFIX)?;
    arguments.get_as_string(API_URL)?;
    Ok(())
}

/// Consumer UUIDs key stored exports, so they may not contain path syntax
fn is_plain_identifier(value: &str) -> bool {
    value != "."
        && value != ".."
        && !value
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control())
}

/// Builder for export job specifications
#[derive(Debug, Clone)]
pub struct ExportJobConfig {
    spec: JobSpec,
}

impl ExportJobConfig {
    fn new() -> Self {
        Self {
            spec: ExportJob::base_spec(),
        }
    }

    /// Required; also the unique-by-argument key
    pub fn set_consumer(mut self, consumer: &ConsumerRef) -> Self {
        self.spec.arguments.set(CONSUMER_KEY, consumer.uuid.as_str());
        self
    }

    /// Org context for logging; not required
    pub fn set_owner(mut self, owner: &OwnerRef) -> Self {
        self.spec.set_metadata(OWNER_KEY, owner.key.as_str());
        self.spec.log_level = owner.log_level;
        self
    }

    pub fn set_cdn_label(mut self, label: impl Into<String>) -> Self {
        self.spec.arguments.set(CDN_LABEL, label.into());
        self
    }

    pub fn set_webapp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.spec.arguments.set(WEBAPP_PREFIX, prefix.into());
        self
    }

    pub fn set_api_url(mut self, url: impl Into<String>) -> Self {
        self.spec.arguments.set(API_URL, url.into());
        self
    }

    pub fn set_extension_data(mut self, data: &BTreeMap<String, String>) -> Self {
        let object = data
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect::<serde_json::Map<_, _>>();
        self.spec.arguments.set(EXTENSION_DATA, object);
        self
    }

    pub fn set_log_execution_details(mut self, enabled: bool) -> Self {
        self.spec.log_execution_details = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), JobConfigValidationError> {
        self.spec.validate_base()?;
        ExportJob::validate(&self.spec)
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn into_spec(self) -> JobSpec {
        self.spec
    }
}

impl From<ExportJobConfig> for JobSpec {
    fn from(config: ExportJobConfig) -> Self {
        config.into_spec()
    }
}
