//! JSON-RPC API Layer
//!
//! Exposes job submission, status, cancellation and resubmission over
//! JSON-RPC 2.0, plus a few administrative methods.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
