//! Local entitlement collaborators wired into the daemon
//!
//! Manifests are written as JSON documents under the export directory.
//! Certificate regeneration has no local backend and only records the
//! request.

use async_trait::async_trait;
use entitle_core::port::{
    CertificateRegenRequest, CertificateRegenerator, CollaboratorError, ExportRequest,
    ExportResult, IdProvider, ManifestManager,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct ManifestDocument<'a> {
    export_id: &'a str,
    consumer_uuid: &'a str,
    cdn_label: &'a str,
    webapp_prefix: Option<&'a str>,
    api_url: Option<&'a str>,
    extension_data: &'a BTreeMap<String, String>,
    created: String,
}

pub struct FileManifestManager {
    export_dir: PathBuf,
    id_provider: Arc<dyn IdProvider>,
}

impl FileManifestManager {
    pub fn new(export_dir: impl Into<PathBuf>, id_provider: Arc<dyn IdProvider>) -> Self {
        Self {
            export_dir: export_dir.into(),
            id_provider,
        }
    }
}

#[async_trait]
impl ManifestManager for FileManifestManager {
    async fn generate_and_store_manifest(
        &self,
        request: ExportRequest,
    ) -> Result<ExportResult, CollaboratorError> {
        // Validation rejects these at submission; jobs admitted earlier may not have been checked
        let mut components = Path::new(&request.consumer_uuid).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(CollaboratorError::Failed(format!(
                "consumer UUID '{}' cannot name an export directory",
                request.consumer_uuid
            )));
        }

        let export_id = self.id_provider.generate_id();
        let document = ManifestDocument {
            export_id: &export_id,
            consumer_uuid: &request.consumer_uuid,
            cdn_label: &request.cdn_label,
            webapp_prefix: request.webapp_prefix.as_deref(),
            api_url: request.api_url.as_deref(),
            extension_data: &request.extension_data,
            created: chrono::Utc::now().to_rfc3339(),
        };
        let body = serde_json::to_vec_pretty(&document)
            .map_err(|e| CollaboratorError::Failed(format!("manifest encoding failed: {}", e)))?;

        let consumer_dir = self.export_dir.join(&request.consumer_uuid);
        tokio::fs::create_dir_all(&consumer_dir).await?;
        let path = consumer_dir.join(format!("{}.json", export_id));
        tokio::fs::write(&path, body).await?;

        debug!(path = %path.display(), "Manifest written");

        let href = format!(
            "{}/consumers/{}/export/{}",
            request.api_url.as_deref().unwrap_or("").trim_end_matches('/'),
            request.consumer_uuid,
            export_id
        );

        Ok(ExportResult {
            exported_consumer: request.consumer_uuid,
            export_id,
            href,
        })
    }
}

pub struct LoggingCertificateRegenerator;

#[async_trait]
impl CertificateRegenerator for LoggingCertificateRegenerator {
    async fn regenerate_certificates_of(
        &self,
        request: CertificateRegenRequest,
    ) -> Result<(), CollaboratorError> {
        info!(
            environment_id = %request.environment_id,
            content_ids = ?request.content_ids,
            lazy = request.lazy,
            "Entitlement certificates marked for regeneration"
        );
        Ok(())
    }
}
