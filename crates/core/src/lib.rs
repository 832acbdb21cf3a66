// Entitle Core - Domain Logic, Ports & Job Scheduling
// NO infrastructure dependencies (hexagonal core)

pub mod application;
pub mod domain;
pub mod error;
pub mod jobs;
pub mod port;

pub use error::{AppError, Result};
