//! Entitle async job engine - daemon entry point

mod collaborators;
mod config;
mod telemetry;

use anyhow::{Context, Result};
use collaborators::{FileManifestManager, LoggingCertificateRegenerator};
use config::DaemonConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use entitle_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use entitle_core::application::{
    shutdown_channel, JobRegistry, JobScheduler, MaintenanceScheduler, RecoveryService, Worker,
};
use entitle_core::jobs::register_entitlement_jobs;
use entitle_core::port::id_provider::UuidProvider;
use entitle_core::port::time_provider::SystemTimeProvider;
use entitle_core::port::{Maintenance, MaintenanceConfig};
use entitle_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository, SqliteMaintenance};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let config = DaemonConfig::from_env().context("Invalid configuration")?;
    let _log_guard = telemetry::init_tracing(&config)?;

    info!(version = VERSION, "Entitle job engine starting");

    // 2. Job store
    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        if !config.db_path.starts_with("sqlite:") && !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    info!(db_path = %config.db_path, "Initializing database...");
    let pool = create_pool(&config.db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let store = Arc::new(SqliteJobRepository::new(pool.clone()));
    let maintenance: Arc<dyn Maintenance> =
        Arc::new(SqliteMaintenance::new(pool.clone(), time_provider.clone()));

    // 3. Job types
    let mut registry = JobRegistry::new();
    register_entitlement_jobs(
        &mut registry,
        Arc::new(FileManifestManager::new(
            config.export_dir.clone(),
            id_provider.clone(),
        )),
        Arc::new(LoggingCertificateRegenerator),
    )
    .context("Job registration failed")?;

    let scheduler = Arc::new(JobScheduler::new(
        Arc::new(registry),
        store.clone(),
        id_provider,
        time_provider.clone(),
    ));

    // 4. Crash recovery: one daemon per store, so every RUNNING row is orphaned
    let recovery = RecoveryService::new(store.clone(), time_provider.clone(), Some(0));
    match recovery.recover_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => error!(error = ?e, "Crash recovery failed"),
    }

    // 5. Workers
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut worker_handles = Vec::with_capacity(config.workers);
    for n in 1..=config.workers {
        let worker =
            Worker::for_scheduler(format!("worker-{}", n), &scheduler, time_provider.clone());
        let token = shutdown_rx.clone();
        worker_handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(token).await {
                error!(error = ?e, "Worker failed");
            }
        }));
    }
    info!(workers = config.workers, "Workers started");

    // 6. Maintenance
    let maintenance_config = MaintenanceConfig {
        terminal_job_retention_days: config.retention_days,
        ..MaintenanceConfig::default()
    };
    let maintenance_scheduler = MaintenanceScheduler::new(
        maintenance.clone(),
        maintenance_config.clone(),
        config.maintenance_interval_hours,
    );
    let maintenance_handle = tokio::spawn(maintenance_scheduler.run(shutdown_rx.clone()));

    // 7. JSON-RPC server
    let rpc_server = RpcServer::new(
        RpcServerConfig {
            port: config.rpc_port,
            ..Default::default()
        },
        RpcHandler::new(scheduler.clone(), maintenance, maintenance_config),
    );
    let (rpc_addr, rpc_handle) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(rpc_addr = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 8. Graceful shutdown
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;

    for handle in worker_handles {
        if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, handle).await.is_err() {
            error!("Worker did not stop in time");
        }
    }
    let _ = tokio::time::timeout(WORKER_DRAIN_TIMEOUT, maintenance_handle).await;

    info!("Shutdown complete");
    Ok(())
}
