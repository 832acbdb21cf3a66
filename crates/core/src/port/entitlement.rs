// Entitlement collaborator ports (manifest export, certificate regeneration)
//
// The business logic behind these calls lives outside the job engine.
// Job units only see these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Reference to a consumer (system or distributor) by UUID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRef {
    pub uuid: String,
}

impl ConsumerRef {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }
}

/// Reference to an owning organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub key: String,
    /// Organization-level logging override
    pub log_level: Option<crate::domain::LogLevel>,
}

impl OwnerRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            log_level: None,
        }
    }
}

/// Reference to an environment by ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRef {
    pub id: String,
}

impl EnvironmentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Inputs for a manifest export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub consumer_uuid: String,
    pub cdn_label: String,
    pub webapp_prefix: Option<String>,
    pub api_url: Option<String>,
    pub extension_data: BTreeMap<String, String>,
}

/// Stored manifest reference returned to the caller as the job result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResult {
    pub exported_consumer: String,
    pub export_id: String,
    pub href: String,
}

/// Inputs for an environment certificate regeneration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRegenRequest {
    pub environment_id: String,
    pub content_ids: BTreeSet<String>,
    pub lazy: bool,
}

/// Failure reported by an entitlement collaborator
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{0}")]
    Failed(String),

    /// Transient: the same call may succeed later
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CollaboratorError::Unavailable(_))
    }
}

/// Generates and stores consumer manifests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManifestManager: Send + Sync {
    async fn generate_and_store_manifest(
        &self,
        request: ExportRequest,
    ) -> Result<ExportResult, CollaboratorError>;
}

/// Regenerates entitlement certificates for an environment's content
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CertificateRegenerator: Send + Sync {
    async fn regenerate_certificates_of(
        &self,
        request: CertificateRegenRequest,
    ) -> Result<(), CollaboratorError>;
}
