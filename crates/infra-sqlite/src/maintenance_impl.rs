// SQLite Maintenance Implementation
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use entitle_core::domain::JobState;
use entitle_core::error::{AppError, Result};
use entitle_core::port::{Maintenance, MaintenanceStats, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// SQLite maintenance implementation
pub struct SqliteMaintenance {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteMaintenance {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    async fn pragma(&self, name: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(&format!("PRAGMA {}", name))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read PRAGMA {}: {}", name, e)))
    }

    /// DB size in bytes (page_count * page_size)
    async fn get_db_size_bytes(&self) -> Result<i64> {
        Ok(self.pragma("page_count").await? * self.pragma("page_size").await?)
    }
}

fn bytes_to_mb(bytes: i64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn vacuum(&self) -> Result<f64> {
        info!("Running VACUUM to optimize database...");

        let size_before = bytes_to_mb(self.get_db_size_bytes().await?);

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("VACUUM failed: {}", e)))?;

        let size_after = bytes_to_mb(self.get_db_size_bytes().await?);
        let reclaimed = (size_before - size_after).max(0.0);

        info!(
            size_before_mb = size_before,
            size_after_mb = size_after,
            reclaimed_mb = reclaimed,
            "VACUUM completed"
        );

        Ok(reclaimed)
    }

    async fn purge_terminal_jobs(&self, retention_days: i64) -> Result<i64> {
        let cutoff_time = self
            .time_provider
            .now_millis()
            .saturating_sub(retention_days.saturating_mul(MILLIS_PER_DAY));

        info!(
            retention_days = retention_days,
            cutoff_time = cutoff_time,
            "Purging terminal jobs"
        );

        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE state IN (?, ?, ?)
            AND COALESCE(finished_at, created_at) < ?
            "#,
        )
        .bind(JobState::Finished.to_string())
        .bind(JobState::Failed.to_string())
        .bind(JobState::Canceled.to_string())
        .bind(cutoff_time)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let deleted = result.rows_affected() as i64;
        info!(deleted_jobs = deleted, "Terminal job purge completed");
        Ok(deleted)
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let db_size_bytes = self.get_db_size_bytes().await?;

        let job_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let terminal_job_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE state IN (?, ?, ?)")
                .bind(JobState::Finished.to_string())
                .bind(JobState::Failed.to_string())
                .bind(JobState::Canceled.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let page_count = self.pragma("page_count").await?;
        let freelist_count = self.pragma("freelist_count").await?;
        let fragmentation_percent = if page_count > 0 {
            (freelist_count as f64 / page_count as f64) * 100.0
        } else {
            0.0
        };

        Ok(MaintenanceStats {
            db_size_mb: bytes_to_mb(db_size_bytes),
            db_size_bytes,
            job_count,
            terminal_job_count,
            fragmentation_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteJobRepository};
    use entitle_core::domain::{JobInstance, JobSpec};
    use entitle_core::port::time_provider::mocks::ManualTimeProvider;
    use entitle_core::port::{Transaction, TransactionalJobRepository};

    async fn setup(clock: Arc<ManualTimeProvider>) -> (SqliteJobRepository, SqliteMaintenance) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        (
            SqliteJobRepository::new(pool.clone()),
            SqliteMaintenance::new(pool, clock),
        )
    }

    #[tokio::test]
    async fn test_maintenance_stats() {
        let (_, maintenance) = setup(Arc::new(ManualTimeProvider::new(0))).await;

        let stats = maintenance.get_stats().await.unwrap();
        assert!(stats.db_size_mb > 0.0);
        assert_eq!(stats.job_count, 0);
        assert_eq!(stats.terminal_job_count, 0);
    }

    #[tokio::test]
    async fn test_vacuum() {
        let (_, maintenance) = setup(Arc::new(ManualTimeProvider::new(0))).await;
        assert!(maintenance.vacuum().await.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_purge_only_expired_terminal_jobs() {
        let clock = Arc::new(ManualTimeProvider::new(0));
        let (repo, maintenance) = setup(clock.clone()).await;

        let mut expired = JobInstance::new("expired", JobSpec::new("EXPORT_JOB", "export_manifest"), 0);
        expired.enqueue().unwrap();
        expired.cancel(10).unwrap();
        let mut active = JobInstance::new("active", JobSpec::new("EXPORT_JOB", "export_manifest"), 0);
        active.enqueue().unwrap();

        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert(&expired).await.unwrap();
        tx.insert(&active).await.unwrap();
        tx.commit().await.unwrap();

        clock.advance(8 * MILLIS_PER_DAY);
        assert_eq!(maintenance.purge_terminal_jobs(7).await.unwrap(), 1);

        let stats = maintenance.get_stats().await.unwrap();
        assert_eq!(stats.job_count, 1);
        assert_eq!(stats.terminal_job_count, 0);
    }

    #[tokio::test]
    async fn test_purge_with_unbounded_retention_deletes_nothing() {
        let clock = Arc::new(ManualTimeProvider::new(0));
        let (repo, maintenance) = setup(clock.clone()).await;

        let mut done = JobInstance::new("done", JobSpec::new("EXPORT_JOB", "export_manifest"), 0);
        done.enqueue().unwrap();
        done.cancel(10).unwrap();
        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert(&done).await.unwrap();
        tx.commit().await.unwrap();

        clock.advance(8 * MILLIS_PER_DAY);
        assert_eq!(maintenance.purge_terminal_jobs(i64::MAX).await.unwrap(), 0);
        assert_eq!(maintenance.get_stats().await.unwrap().job_count, 1);
    }
}
