// SQLite Transaction Implementation (atomic admission)

use crate::error::map_sqlx_error;
use crate::job_repository::{JobRow, ACTIVE_STATES};
use async_trait::async_trait;
use entitle_core::domain::JobInstance;
use entitle_core::error::Result;
use entitle_core::port::{JobRepositoryTransaction, Transaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};

pub struct SqliteJobTransaction<'a> {
    tx: SqlxTransaction<'a, Sqlite>,
}

impl<'a> SqliteJobTransaction<'a> {
    pub fn new(tx: SqlxTransaction<'a, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for SqliteJobTransaction<'_> {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl JobRepositoryTransaction for SqliteJobTransaction<'_> {
    async fn find_active_by_key(&mut self, job_key: &str) -> Result<Vec<JobInstance>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT * FROM jobs WHERE job_key = ? AND state IN {} ORDER BY created_at ASC, rowid ASC",
            ACTIVE_STATES
        ))
        .bind(job_key)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn insert(&mut self, job: &JobInstance) -> Result<()> {
        let spec = serde_json::to_string(&job.spec)?;
        let outcome = job.outcome.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, job_key, job_name, state, spec, owner_key, worker_id,
                cancel_requested, outcome, created_at, started_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.spec.job_key)
        .bind(&job.spec.job_name)
        .bind(job.state.to_string())
        .bind(spec)
        .bind(job.spec.owner_key())
        .bind(&job.worker_id)
        .bind(job.cancel_requested)
        .bind(outcome)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{create_pool, run_migrations, SqliteJobRepository};
    use entitle_core::domain::{JobInstance, JobSpec};
    use entitle_core::port::{JobRepository, Transaction, TransactionalJobRepository};

    fn queued(id: &str) -> JobInstance {
        let mut job = JobInstance::new(id, JobSpec::new("EXPORT_JOB", "export_manifest"), 1000);
        job.enqueue().unwrap();
        job
    }

    #[tokio::test]
    async fn test_rollback_discards_insert() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = SqliteJobRepository::new(pool);

        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert(&queued("job-1")).await.unwrap();
        assert_eq!(tx.find_active_by_key("EXPORT_JOB").await.unwrap().len(), 1);
        tx.rollback().await.unwrap();

        assert!(repo.find_by_id(&"job-1".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_database_error() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = SqliteJobRepository::new(pool);

        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert(&queued("job-1")).await.unwrap();
        let err = tx.insert(&queued("job-1")).await.unwrap_err();
        assert!(err.to_string().contains("Unique constraint"));
    }
}
