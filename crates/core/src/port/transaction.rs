// Transaction port for atomic admission (check constraints + insert)

use crate::domain::JobInstance;
use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Transactional JobRepository operations
#[async_trait]
pub trait TransactionalJobRepository: Send + Sync {
    /// Begin a new transaction
    async fn begin_transaction(&self) -> Result<Box<dyn JobRepositoryTransaction>>;
}

/// JobRepository operations within a transaction
#[async_trait]
pub trait JobRepositoryTransaction: Transaction {
    /// Non-terminal instances of a job key (within transaction)
    async fn find_active_by_key(&mut self, job_key: &str) -> Result<Vec<JobInstance>>;

    /// Insert instance (within transaction)
    async fn insert(&mut self, job: &JobInstance) -> Result<()>;
}
