// Worker - Job execution loop

pub mod constants;
mod panic_guard;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::cancellation::CancellationRegistry;
use crate::application::registry::JobRegistry;
use crate::application::scheduler::JobScheduler;
use crate::domain::{JobFailure, JobInstance, JobState};
use crate::error::Result;
use crate::port::{JobExecutionContext, JobRepository, TimeProvider};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Worker claims QUEUED instances and runs their job units one at a time
pub struct Worker {
    worker_id: String,
    registry: Arc<JobRegistry>,
    job_repo: Arc<dyn JobRepository>,
    cancellations: Arc<CancellationRegistry>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Worker {
    pub fn new(
        worker_id: impl Into<String>,
        registry: Arc<JobRegistry>,
        job_repo: Arc<dyn JobRepository>,
        cancellations: Arc<CancellationRegistry>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            registry,
            job_repo,
            cancellations,
            time_provider,
        }
    }

    /// Worker sharing the scheduler's registry, store and cancellation signals
    pub fn for_scheduler(
        worker_id: impl Into<String>,
        scheduler: &JobScheduler,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self::new(
            worker_id,
            Arc::clone(scheduler.registry()),
            scheduler.job_repository(),
            scheduler.cancellations(),
            time_provider,
        )
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker_id = %self.worker_id, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!(worker_id = %self.worker_id, "Worker shutting down");
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(worker_id = %self.worker_id, "Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(worker_id = %self.worker_id, "Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(worker_id = %self.worker_id, "Worker stopped");
        Ok(())
    }

    /// Claim and execute one instance (returns true if one was processed)
    pub async fn process_next_job(&self) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let mut job = match self.job_repo.claim_next(&self.worker_id, now).await? {
            Some(job) => job,
            None => return Ok(false),
        };

        let span = info_span!(
            "job",
            job_id = %job.id,
            job_key = %job.job_key(),
            worker_id = %self.worker_id,
            owner_key = job.spec.owner_key().unwrap_or("-"),
            log_level = job.spec.log_level.map(|l| l.to_string()).unwrap_or_default(),
        );

        let unit = match self.registry.instantiate(job.job_key()) {
            Ok(unit) => unit,
            Err(e) => {
                span.in_scope(|| error!(error = %e, "No job unit for claimed instance"));
                let failure = JobFailure {
                    message: format!("job unit unavailable: {}", e),
                    retryable: false,
                    cause: Some(e.to_string()),
                };
                job.fail(self.time_provider.now_millis(), failure)?;
                self.record_outcome(&job).await?;
                return Ok(true);
            }
        };

        let token = self.cancellations.register(&job.id);
        let ctx = JobExecutionContext::new(&job, token);
        let verbose = job.spec.log_execution_details;

        span.in_scope(|| {
            if verbose {
                info!("Starting job execution");
            } else {
                debug!("Starting job execution");
            }
        });

        // Spawned so a panicking unit cannot take the worker down
        let handle = tokio::spawn(
            async move { unit.execute(&ctx).await }.instrument(span.clone()),
        );
        let execution_result = handle.await;
        self.cancellations.unregister(&job.id);

        let finished_at = self.time_provider.now_millis();
        let elapsed_ms = finished_at - job.started_at.unwrap_or(finished_at);

        match execution_result {
            Ok(Ok(result)) => {
                job.finish(finished_at, result)?;
                span.in_scope(|| {
                    if verbose {
                        info!(elapsed_ms, "Job finished");
                    } else {
                        debug!(elapsed_ms, "Job finished");
                    }
                });
            }
            Ok(Err(e)) => {
                let failure = JobFailure::from(&e);
                span.in_scope(|| {
                    warn!(
                        elapsed_ms,
                        retryable = failure.retryable,
                        error = %e,
                        "Job failed"
                    )
                });
                job.fail(finished_at, failure)?;
            }
            Err(join_err) => {
                let message = panic_guard::describe_join_error(&job.id, join_err);
                job.fail(
                    finished_at,
                    JobFailure {
                        message: format!("job unit did not complete: {}", message),
                        retryable: false,
                        cause: Some(message),
                    },
                )?;
            }
        }

        self.record_outcome(&job).await?;
        Ok(true)
    }

    /// Persist a terminal outcome unless the instance was canceled meanwhile
    ///
    /// Store errors are retried with back-off so a completed execution does
    /// not stay RUNNING (and keep blocking its constraints) until recovery.
    async fn record_outcome(&self, job: &JobInstance) -> Result<()> {
        let mut delay = OUTCOME_RETRY_INITIAL_DELAY;
        let mut attempt = 1;
        loop {
            match self.job_repo.update_if_state(job, JobState::Running).await {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    info!(
                        job_id = %job.id,
                        discarded_state = %job.state,
                        "Outcome discarded: job was canceled while running"
                    );
                    return Ok(());
                }
                Err(e) if attempt < OUTCOME_WRITE_ATTEMPTS => {
                    warn!(
                        job_id = %job.id,
                        attempt,
                        error = %e,
                        "Failed to record job outcome, retrying"
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(ERROR_RECOVERY_SLEEP_DURATION);
                    attempt += 1;
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "Giving up on recording job outcome");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        JobConfigValidationError, JobExecutionError, JobResult, JobSpec,
    };
    use crate::port::id_provider::mocks::SequenceIdProvider;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use crate::port::{AsyncJob, InMemoryJobRepository, JobDefinition};
    use crate::error::AppError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Behaviour selected by the "mode" argument
    struct ScriptedJob;

    #[async_trait]
    impl AsyncJob for ScriptedJob {
        async fn execute(
            &self,
            ctx: &JobExecutionContext,
        ) -> std::result::Result<JobResult, JobExecutionError> {
            match ctx.arguments().get_as_string_or("mode", "ok")?.as_str() {
                "ok" => Ok(serde_json::json!({"job": ctx.job_id()})),
                "busy" => Err(JobExecutionError::retryable("service busy")),
                "bad" => Err(JobExecutionError::terminal("bad input")),
                "panic" => panic!("unit blew up"),
                "wait" => {
                    let _ = tokio::time::timeout(Duration::from_secs(2), ctx.cancelled()).await;
                    Ok(serde_json::json!({"cancelled": ctx.is_cancelled()}))
                }
                other => Err(JobExecutionError::terminal(format!("unknown mode {other}"))),
            }
        }
    }

    impl JobDefinition for ScriptedJob {
        const JOB_KEY: &'static str = "SCRIPTED_JOB";
        const JOB_NAME: &'static str = "scripted";

        fn validate(_spec: &JobSpec) -> std::result::Result<(), JobConfigValidationError> {
            Ok(())
        }
    }

    fn setup() -> (Arc<JobScheduler>, Worker, Arc<InMemoryJobRepository>) {
        let mut registry = JobRegistry::new();
        registry.register(|| ScriptedJob).unwrap();
        let store = Arc::new(InMemoryJobRepository::new());
        let clock: Arc<dyn TimeProvider> = Arc::new(ManualTimeProvider::new(1000));
        let scheduler = Arc::new(JobScheduler::new(
            Arc::new(registry),
            Arc::clone(&store),
            Arc::new(SequenceIdProvider::new("job")),
            Arc::clone(&clock),
        ));
        let worker = Worker::for_scheduler("worker-1", &scheduler, clock);
        (scheduler, worker, store)
    }

    async fn submit(scheduler: &JobScheduler, mode: &str) -> String {
        let mut spec = ScriptedJob::base_spec();
        spec.arguments.set("mode", mode);
        scheduler.submit(spec).await.unwrap()
    }

    #[tokio::test]
    async fn test_idle_worker_processes_nothing() {
        let (_, worker, _) = setup();
        assert!(!worker.process_next_job().await.unwrap());
    }

    #[tokio::test]
    async fn test_successful_job_is_finished() {
        let (scheduler, worker, _) = setup();
        let id = submit(&scheduler, "ok").await;

        assert!(worker.process_next_job().await.unwrap());

        let status = scheduler.get_status(&id).await.unwrap();
        assert_eq!(status.state, JobState::Finished);
        assert_eq!(status.result, Some(serde_json::json!({"job": id})));
        assert!(status.failure.is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_retryable_flag() {
        let (scheduler, worker, _) = setup();
        let busy = submit(&scheduler, "busy").await;
        let bad = submit(&scheduler, "bad").await;

        worker.process_next_job().await.unwrap();
        worker.process_next_job().await.unwrap();

        let busy = scheduler.get_status(&busy).await.unwrap();
        assert_eq!(busy.state, JobState::Failed);
        assert!(busy.failure.unwrap().retryable);

        let bad = scheduler.get_status(&bad).await.unwrap();
        assert!(!bad.failure.unwrap().retryable);
    }

    #[tokio::test]
    async fn test_panic_becomes_terminal_failure() {
        let (scheduler, worker, _) = setup();
        let id = submit(&scheduler, "panic").await;

        assert!(worker.process_next_job().await.unwrap());

        let failure = scheduler.get_status(&id).await.unwrap().failure.unwrap();
        assert!(!failure.retryable);
        assert_eq!(failure.cause.as_deref(), Some("unit blew up"));
    }

    #[tokio::test]
    async fn test_unregistered_key_fails_instance() {
        let (_, worker, store) = setup();
        let mut orphan = JobInstance::new("job-x", JobSpec::new("GONE_JOB", "gone"), 0);
        orphan.enqueue().unwrap();
        store.insert(&orphan).await.unwrap();

        assert!(worker.process_next_job().await.unwrap());

        let stored = store.find_by_id(&"job-x".to_string()).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        let failure = stored.failure().unwrap();
        assert!(!failure.retryable);
        assert_eq!(
            failure.cause.as_deref(),
            Some("No job unit registered for job key: GONE_JOB")
        );
    }

    /// Delegates to the in-memory store but fails the first N outcome writes
    struct FlakyOutcomeStore {
        inner: Arc<InMemoryJobRepository>,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl JobRepository for FlakyOutcomeStore {
        async fn find_by_id(&self, id: &crate::domain::JobId) -> Result<Option<JobInstance>> {
            self.inner.find_by_id(id).await
        }

        async fn claim_next(&self, worker_id: &str, now_millis: i64) -> Result<Option<JobInstance>> {
            self.inner.claim_next(worker_id, now_millis).await
        }

        async fn update_if_state(&self, job: &JobInstance, expected: JobState) -> Result<bool> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(AppError::Database("database is locked".to_string()));
            }
            self.inner.update_if_state(job, expected).await
        }

        async fn find_active_by_key(&self, job_key: &str) -> Result<Vec<JobInstance>> {
            self.inner.find_active_by_key(job_key).await
        }

        async fn find_by_state(&self, state: JobState) -> Result<Vec<JobInstance>> {
            self.inner.find_by_state(state).await
        }

        async fn count_by_state(&self, state: JobState) -> Result<i64> {
            self.inner.count_by_state(state).await
        }
    }

    fn flaky_worker(failures: usize) -> (Worker, Arc<InMemoryJobRepository>) {
        let mut registry = JobRegistry::new();
        registry.register(|| ScriptedJob).unwrap();
        let inner = Arc::new(InMemoryJobRepository::new());
        let store = Arc::new(FlakyOutcomeStore {
            inner: Arc::clone(&inner),
            failures_left: AtomicUsize::new(failures),
        });
        let worker = Worker::new(
            "worker-1",
            Arc::new(registry),
            store,
            CancellationRegistry::new(),
            Arc::new(ManualTimeProvider::new(1000)),
        );
        (worker, inner)
    }

    async fn queue_scripted(store: &InMemoryJobRepository, id: &str) {
        let mut job = JobInstance::new(id, ScriptedJob::base_spec(), 0);
        job.enqueue().unwrap();
        store.insert(&job).await.unwrap();
    }

    #[tokio::test]
    async fn test_outcome_write_retried_after_store_error() {
        let (worker, store) = flaky_worker(2);
        queue_scripted(&store, "job-1").await;

        assert!(worker.process_next_job().await.unwrap());

        let stored = store.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Finished);
        assert!(stored.result().is_some());
    }

    #[tokio::test]
    async fn test_outcome_write_gives_up_eventually() {
        let (worker, store) = flaky_worker(OUTCOME_WRITE_ATTEMPTS as usize);
        queue_scripted(&store, "job-1").await;

        assert!(worker.process_next_job().await.is_err());
        let stored = store.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Running);
    }

    #[tokio::test]
    async fn test_cancel_while_running_discards_outcome() {
        let (scheduler, worker, _) = setup();
        let id = submit(&scheduler, "wait").await;

        let worker = Arc::new(worker);
        let running = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.process_next_job().await })
        };

        // Wait until claimed
        for _ in 0..100 {
            if scheduler.get_status(&id).await.unwrap().state == JobState::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(scheduler.cancel(&id).await.unwrap());
        assert!(running.await.unwrap().unwrap());

        let status = scheduler.get_status(&id).await.unwrap();
        assert_eq!(status.state, JobState::Canceled);
        assert!(status.result.is_none());
    }

    #[tokio::test]
    async fn test_run_loop_stops_on_shutdown() {
        let (scheduler, worker, _) = setup();
        let id = submit(&scheduler, "ok").await;
        let (sender, token) = shutdown_channel();

        let worker = Arc::new(worker);
        let handle = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.run(token).await })
        };

        for _ in 0..100 {
            if scheduler.get_status(&id).await.unwrap().state == JobState::Finished {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sender.shutdown();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            scheduler.get_status(&id).await.unwrap().state,
            JobState::Finished
        );
    }
}
