// Entitle Infrastructure - SQLite Adapter
// Implements: JobRepository, TransactionalJobRepository, Maintenance

mod connection;
mod error;
mod job_repository;
mod maintenance_impl;
mod migration;
mod transaction;

pub use connection::create_pool;
pub use job_repository::SqliteJobRepository;
pub use maintenance_impl::SqliteMaintenance;
pub use migration::run_migrations;
pub use transaction::SqliteJobTransaction;

// sqlx::Error cannot implement From for AppError here (orphan rules);
// adapters go through error::map_sqlx_error instead
