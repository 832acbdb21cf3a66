//! RPC Request/Response Types

use entitle_core::domain::{JobId, JobState, JobStatus, LogLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// jobs.submit.v1 - Submit a job instance
///
/// Key, name and constraints come from the registered job type; the
/// request supplies arguments and owner metadata.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub job_key: String,
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub log_level: Option<LogLevel>,
    #[serde(default)]
    pub log_execution_details: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub state: JobState,
}

/// jobs.status.v1 / jobs.cancel.v1 / jobs.resubmit.v1
#[derive(Debug, Deserialize)]
pub struct JobIdRequest {
    pub job_id: JobId,
}

pub type StatusResponse = JobStatus;

#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResubmitResponse {
    pub job_id: JobId,
    pub new_job_id: JobId,
    pub state: JobState,
}

/// jobs.list.v1 - List instances in a state
#[derive(Debug, Deserialize)]
pub struct ListRequest {
    pub state: JobState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub jobs: Vec<JobStatus>,
}

/// admin.stats.v1 - Get system statistics
#[derive(Debug, Default, Deserialize)]
pub struct StatsRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub jobs_by_state: BTreeMap<String, i64>,
    pub total_jobs: i64,
    pub db_size_bytes: i64,
    pub uptime_seconds: u64,
}

/// admin.maintenance.v1 - Run manual maintenance
#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    #[serde(default)]
    pub force_vacuum: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceResponse {
    pub success: bool,
    pub purged_jobs: i64,
    pub vacuum_performed: bool,
    pub reclaimed_mb: f64,
    pub db_size_mb: f64,
}
