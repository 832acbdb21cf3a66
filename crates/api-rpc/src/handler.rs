//! RPC Method Handlers
//!
//! Thin translation between wire types and the [`JobScheduler`].

use crate::error::to_rpc_error;
use crate::types::{
    CancelResponse, JobIdRequest, ListRequest, ListResponse, MaintenanceRequest,
    MaintenanceResponse, ResubmitResponse, StatsRequest, StatsResponse, StatusResponse,
    SubmitRequest, SubmitResponse,
};
use entitle_core::application::JobScheduler;
use entitle_core::domain::{JobArguments, JobState};
use entitle_core::port::{Maintenance, MaintenanceConfig};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use std::time::Instant;

/// Fragmentation above which manual maintenance compacts the store
const VACUUM_FRAGMENTATION_PERCENT: f64 = 10.0;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    scheduler: Arc<JobScheduler>,
    maintenance: Arc<dyn Maintenance>,
    maintenance_config: MaintenanceConfig,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        scheduler: Arc<JobScheduler>,
        maintenance: Arc<dyn Maintenance>,
        maintenance_config: MaintenanceConfig,
    ) -> Self {
        Self {
            scheduler,
            maintenance,
            maintenance_config,
            start_time: Instant::now(),
        }
    }

    /// jobs.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        let mut spec = self
            .scheduler
            .registry()
            .base_spec(&params.job_key)
            .map_err(to_rpc_error)?;

        spec.arguments = JobArguments::from(params.arguments);
        spec.metadata.extend(params.metadata);
        spec.log_level = params.log_level;
        spec.log_execution_details = params.log_execution_details;

        let job_id = self.scheduler.submit(spec).await.map_err(to_rpc_error)?;

        Ok(SubmitResponse {
            job_id,
            state: JobState::Queued,
        })
    }

    /// jobs.status.v1
    pub async fn status(&self, params: JobIdRequest) -> Result<StatusResponse, ErrorObjectOwned> {
        self.scheduler
            .get_status(&params.job_id)
            .await
            .map_err(to_rpc_error)
    }

    /// jobs.cancel.v1
    ///
    /// `cancelled` is false when the instance had already completed.
    pub async fn cancel(&self, params: JobIdRequest) -> Result<CancelResponse, ErrorObjectOwned> {
        let cancelled = self
            .scheduler
            .cancel(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(CancelResponse {
            job_id: params.job_id,
            cancelled,
        })
    }

    /// jobs.resubmit.v1
    pub async fn resubmit(
        &self,
        params: JobIdRequest,
    ) -> Result<ResubmitResponse, ErrorObjectOwned> {
        let new_job_id = self
            .scheduler
            .resubmit(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(ResubmitResponse {
            job_id: params.job_id,
            new_job_id,
            state: JobState::Queued,
        })
    }

    /// jobs.list.v1
    pub async fn list(&self, params: ListRequest) -> Result<ListResponse, ErrorObjectOwned> {
        let jobs = self
            .scheduler
            .list_jobs(params.state)
            .await
            .map_err(to_rpc_error)?;
        Ok(ListResponse { jobs })
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> Result<StatsResponse, ErrorObjectOwned> {
        let counts = self.scheduler.counts_by_state().await.map_err(to_rpc_error)?;
        let stats = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        Ok(StatsResponse {
            jobs_by_state: counts
                .into_iter()
                .map(|(state, count)| (state.to_string(), count))
                .collect(),
            total_jobs: stats.job_count,
            db_size_bytes: stats.db_size_bytes,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }

    /// admin.maintenance.v1
    pub async fn maintenance(
        &self,
        params: MaintenanceRequest,
    ) -> Result<MaintenanceResponse, ErrorObjectOwned> {
        let stats_before = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        let purged_jobs = self
            .maintenance
            .purge_terminal_jobs(self.maintenance_config.terminal_job_retention_days)
            .await
            .map_err(to_rpc_error)?;

        let vacuum_performed = params.force_vacuum
            || stats_before.fragmentation_percent > VACUUM_FRAGMENTATION_PERCENT;
        let reclaimed_mb = if vacuum_performed {
            self.maintenance.vacuum().await.map_err(to_rpc_error)?
        } else {
            0.0
        };

        let stats_after = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        Ok(MaintenanceResponse {
            success: true,
            purged_jobs,
            vacuum_performed,
            reclaimed_mb,
            db_size_mb: stats_after.db_size_mb,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use async_trait::async_trait;
    use entitle_core::application::JobRegistry;
    use entitle_core::jobs::register_entitlement_jobs;
    use entitle_core::port::id_provider::mocks::SequenceIdProvider;
    use entitle_core::port::time_provider::mocks::ManualTimeProvider;
    use entitle_core::port::{
        CertificateRegenRequest, CertificateRegenerator, CollaboratorError, ExportRequest,
        ExportResult, InMemoryJobRepository, ManifestManager,
    };
    use serde_json::json;

    struct StubManifests;

    #[async_trait]
    impl ManifestManager for StubManifests {
        async fn generate_and_store_manifest(
            &self,
            request: ExportRequest,
        ) -> Result<ExportResult, CollaboratorError> {
            Ok(ExportResult {
                exported_consumer: request.consumer_uuid,
                export_id: "export-1".to_string(),
                href: "/exports/export-1".to_string(),
            })
        }
    }

    struct StubCertificates;

    #[async_trait]
    impl CertificateRegenerator for StubCertificates {
        async fn regenerate_certificates_of(
            &self,
            _request: CertificateRegenRequest,
        ) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    fn handler() -> RpcHandler {
        let mut registry = JobRegistry::new();
        register_entitlement_jobs(
            &mut registry,
            Arc::new(StubManifests),
            Arc::new(StubCertificates),
        )
        .unwrap();

        let store = Arc::new(InMemoryJobRepository::new());
        let scheduler = JobScheduler::new(
            Arc::new(registry),
            store.clone(),
            Arc::new(SequenceIdProvider::new("job")),
            Arc::new(ManualTimeProvider::new(1_000)),
        );
        RpcHandler::new(Arc::new(scheduler), store, MaintenanceConfig::default())
    }

    fn export_request(consumer: &str) -> SubmitRequest {
        let arguments = json!({ "consumer_uuid": consumer, "cdn_label": "cdn-x" });
        SubmitRequest {
            job_key: "EXPORT_JOB".to_string(),
            arguments: arguments.as_object().cloned().unwrap(),
            metadata: [("owner_key".to_string(), "acme".to_string())].into(),
            log_level: None,
            log_execution_details: false,
        }
    }

    fn job_id(id: &str) -> JobIdRequest {
        JobIdRequest {
            job_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_then_status() {
        let handler = handler();

        let submitted = handler.submit(export_request("c-1")).await.unwrap();
        assert_eq!(submitted.job_id, "job-1");
        assert_eq!(submitted.state, JobState::Queued);

        let status = handler.status(job_id("job-1")).await.unwrap();
        assert_eq!(status.state, JobState::Queued);
        assert_eq!(status.job_name, "export_manifest");
        assert_eq!(status.owner_key.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_duplicate_export_is_conflict() {
        let handler = handler();
        handler.submit(export_request("c-1")).await.unwrap();

        let err = handler.submit(export_request("c-1")).await.unwrap_err();
        assert_eq!(err.code(), code::CONFLICT);

        assert!(handler.submit(export_request("c-2")).await.is_ok());
    }

    #[tokio::test]
    async fn test_submit_errors() {
        let handler = handler();

        let mut unknown = export_request("c-1");
        unknown.job_key = "NOPE".to_string();
        assert_eq!(
            handler.submit(unknown).await.unwrap_err().code(),
            code::UNKNOWN_JOB_KEY
        );

        let mut missing = export_request("c-1");
        missing.arguments = json!({ "consumer_uuid": "c-1" })
            .as_object()
            .cloned()
            .unwrap();
        let err = handler.submit(missing).await.unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
        assert!(err.data().unwrap().get().contains("cdn_label"));
    }

    #[tokio::test]
    async fn test_cancel_and_resubmit() {
        let handler = handler();
        handler.submit(export_request("c-1")).await.unwrap();

        let cancelled = handler.cancel(job_id("job-1")).await.unwrap();
        assert!(cancelled.cancelled);
        assert!(!handler.cancel(job_id("job-1")).await.unwrap().cancelled);

        let resubmitted = handler.resubmit(job_id("job-1")).await.unwrap();
        assert_eq!(resubmitted.new_job_id, "job-2");

        let listed = handler
            .list(ListRequest {
                state: JobState::Queued,
            })
            .await
            .unwrap();
        assert_eq!(listed.jobs.len(), 1);
        assert_eq!(listed.jobs[0].job_id, "job-2");
    }

    #[tokio::test]
    async fn test_unknown_job_not_found() {
        let handler = handler();
        assert_eq!(
            handler.status(job_id("ghost")).await.unwrap_err().code(),
            code::NOT_FOUND
        );
        assert_eq!(
            handler.cancel(job_id("ghost")).await.unwrap_err().code(),
            code::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_stats_counts_by_state() {
        let handler = handler();
        handler.submit(export_request("c-1")).await.unwrap();
        handler.submit(export_request("c-2")).await.unwrap();
        handler.cancel(job_id("job-2")).await.unwrap();

        let stats = handler.stats(StatsRequest::default()).await.unwrap();
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.jobs_by_state["QUEUED"], 1);
        assert_eq!(stats.jobs_by_state["CANCELED"], 1);
        assert_eq!(stats.jobs_by_state["RUNNING"], 0);
    }
}
