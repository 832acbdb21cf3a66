//! Shared harness: a scheduler over either store with scripted collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use entitle_core::application::{JobRegistry, JobScheduler, Worker};
use entitle_core::domain::{JobId, JobState, JobStatus};
use entitle_core::jobs::register_entitlement_jobs;
use entitle_core::port::id_provider::UuidProvider;
use entitle_core::port::time_provider::SystemTimeProvider;
use entitle_core::port::{
    CertificateRegenRequest, CertificateRegenerator, CollaboratorError, ExportRequest,
    ExportResult, InMemoryJobRepository, JobRepository, TransactionalJobRepository,
};
use entitle_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Consumer UUIDs with scripted manifest behavior
pub const UNAVAILABLE_CONSUMER: &str = "consumer-unavailable";
pub const BROKEN_CONSUMER: &str = "consumer-broken";
pub const GATED_CONSUMER: &str = "consumer-gated";

/// Manifest manager whose behavior depends on the consumer UUID
///
/// Fails transiently for [`UNAVAILABLE_CONSUMER`] until `heal` is called,
/// fails terminally for [`BROKEN_CONSUMER`] and blocks on the gate for
/// [`GATED_CONSUMER`].
#[derive(Default)]
pub struct ScriptedManifests {
    pub calls: AtomicUsize,
    pub gate: Notify,
    healed: std::sync::atomic::AtomicBool,
}

impl ScriptedManifests {
    pub fn heal(&self) {
        self.healed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl entitle_core::port::ManifestManager for ScriptedManifests {
    async fn generate_and_store_manifest(
        &self,
        request: ExportRequest,
    ) -> Result<ExportResult, CollaboratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match request.consumer_uuid.as_str() {
            UNAVAILABLE_CONSUMER if !self.healed.load(Ordering::SeqCst) => {
                return Err(CollaboratorError::Unavailable("manifest store busy".into()))
            }
            BROKEN_CONSUMER => {
                return Err(CollaboratorError::Failed(
                    "consumer has no entitlements".into(),
                ))
            }
            GATED_CONSUMER => self.gate.notified().await,
            _ => {}
        }
        Ok(ExportResult {
            export_id: format!("export-{}", call),
            href: format!("/consumers/{}/export/export-{}", request.consumer_uuid, call),
            exported_consumer: request.consumer_uuid,
        })
    }
}

#[derive(Default)]
pub struct RecordingCertificates {
    pub requests: std::sync::Mutex<Vec<CertificateRegenRequest>>,
}

#[async_trait]
impl CertificateRegenerator for RecordingCertificates {
    async fn regenerate_certificates_of(
        &self,
        request: CertificateRegenRequest,
    ) -> Result<(), CollaboratorError> {
        self.requests
            .lock()
            .map_err(|_| CollaboratorError::Failed("poisoned".into()))?
            .push(request);
        Ok(())
    }
}

pub struct Harness {
    pub scheduler: Arc<JobScheduler>,
    pub manifests: Arc<ScriptedManifests>,
    pub certificates: Arc<RecordingCertificates>,
    pub store: Arc<dyn JobRepository>,
    _db_dir: Option<tempfile::TempDir>,
}

impl Harness {
    fn build<S>(store: Arc<S>) -> Self
    where
        S: JobRepository + TransactionalJobRepository + 'static,
    {
        let manifests = Arc::new(ScriptedManifests::default());
        let certificates = Arc::new(RecordingCertificates::default());

        let mut registry = JobRegistry::new();
        register_entitlement_jobs(&mut registry, manifests.clone(), certificates.clone()).unwrap();

        let scheduler = Arc::new(JobScheduler::new(
            Arc::new(registry),
            store.clone(),
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
        ));

        Self {
            scheduler,
            manifests,
            certificates,
            store,
            _db_dir: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::build(Arc::new(InMemoryJobRepository::new()))
    }

    pub async fn sqlite() -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        Self::build(Arc::new(SqliteJobRepository::new(pool)))
    }

    /// WAL database file with a multi-connection pool, as the daemon runs it
    pub async fn sqlite_file() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("jobs.db").display());
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let mut harness = Self::build(Arc::new(SqliteJobRepository::new(pool)));
        harness._db_dir = Some(dir);
        harness
    }

    /// Both store flavors, for properties that must hold on each
    pub async fn all() -> Vec<(&'static str, Harness)> {
        vec![("memory", Self::in_memory()), ("sqlite", Self::sqlite().await)]
    }

    pub fn worker(&self, id: &str) -> Worker {
        Worker::for_scheduler(id, &self.scheduler, Arc::new(SystemTimeProvider))
    }

    pub async fn status(&self, job_id: &JobId) -> JobStatus {
        self.scheduler.get_status(job_id).await.unwrap()
    }

    pub async fn total_jobs(&self) -> i64 {
        let counts = self.scheduler.counts_by_state().await.unwrap();
        counts.iter().map(|(_, count)| count).sum()
    }

    /// Poll until the instance reaches `state`
    pub async fn wait_for_state(&self, job_id: &JobId, state: JobState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.status(job_id).await.state != state {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("job {} never reached {}", job_id, state));
    }
}
