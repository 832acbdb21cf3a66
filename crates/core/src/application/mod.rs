// Application Layer - Use Cases and Job Scheduling

pub mod admission;
pub mod cancellation;
pub mod maintenance;
pub mod recovery;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod worker;

// Re-exports
pub use cancellation::{CancellationRegistry, CancellationToken};
pub use maintenance::MaintenanceScheduler;
pub use recovery::RecoveryService;
pub use registry::JobRegistry;
pub use scheduler::JobScheduler;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker};
