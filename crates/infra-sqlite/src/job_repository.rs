// SQLite JobRepository Implementation

use crate::error::map_sqlx_error;
use crate::SqliteJobTransaction;
use async_trait::async_trait;
use entitle_core::domain::{JobId, JobInstance, JobOutcome, JobSpec, JobState};
use entitle_core::error::{AppError, Result};
use entitle_core::port::{JobRepository, JobRepositoryTransaction, TransactionalJobRepository};
use sqlx::SqlitePool;

pub(crate) const ACTIVE_STATES: &str = "('CREATED', 'QUEUED', 'RUNNING')";

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn find_by_id(&self, id: &JobId) -> Result<Option<JobInstance>> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn claim_next(&self, worker_id: &str, now_millis: i64) -> Result<Option<JobInstance>> {
        // Single statement: two workers can never claim the same row
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?, worker_id = ?
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = ?
                ORDER BY created_at ASC, rowid ASC
                LIMIT 1
            )
            AND state = ?
            RETURNING *
            "#,
        )
        .bind(JobState::Running.to_string())
        .bind(now_millis)
        .bind(worker_id)
        .bind(JobState::Queued.to_string())
        .bind(JobState::Queued.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn update_if_state(&self, job: &JobInstance, expected: JobState) -> Result<bool> {
        let outcome = job.outcome.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?, finished_at = ?, worker_id = ?,
                cancel_requested = ?, outcome = ?
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(job.state.to_string())
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.worker_id)
        .bind(job.cancel_requested)
        .bind(outcome)
        .bind(&job.id)
        .bind(expected.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE id = ?")
            .bind(&job.id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        if exists == 0 {
            return Err(AppError::NotFound(format!("Job {}", job.id)));
        }
        Ok(false)
    }

    async fn find_active_by_key(&self, job_key: &str) -> Result<Vec<JobInstance>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT * FROM jobs WHERE job_key = ? AND state IN {} ORDER BY created_at ASC, rowid ASC",
            ACTIVE_STATES
        ))
        .bind(job_key)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<JobInstance>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE state = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(state.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count_by_state(&self, state: JobState) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE state = ?")
            .bind(state.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl TransactionalJobRepository for SqliteJobRepository {
    /// Takes the write lock up front: a deferred transaction that read
    /// before another connection committed cannot upgrade in WAL mode.
    async fn begin_transaction(&self) -> Result<Box<dyn JobRepositoryTransaction>> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteJobTransaction::new(tx)))
    }
}

/// SQLite row representation
///
/// job_key, job_name and owner_key are denormalized copies of the spec
/// snapshot for indexing and are not read back.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct JobRow {
    id: String,
    state: String,
    spec: String,
    worker_id: Option<String>,
    cancel_requested: bool,
    outcome: Option<String>,
    created_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
}

impl JobRow {
    pub(crate) fn into_job(self) -> Result<JobInstance> {
        let state: JobState = self.state.parse()?;
        let spec: JobSpec = serde_json::from_str(&self.spec)?;
        let outcome: Option<JobOutcome> = self
            .outcome
            .as_deref()
            .map(serde_json::from_str::<JobOutcome>)
            .transpose()?;

        Ok(JobInstance {
            id: self.id,
            spec,
            state,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            worker_id: self.worker_id,
            cancel_requested: self.cancel_requested,
            outcome,
        })
    }
}
