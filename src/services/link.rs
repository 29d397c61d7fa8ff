use crate::services::clock::Clock;
use crate::services::error::PipelineError;
use crate::services::poller::FoundObject;
use crate::services::storage::StorageService;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DownloadLink {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

pub struct LinkIssuer {
    storage: Arc<dyn StorageService>,
    clock: Arc<dyn Clock>,
}

impl LinkIssuer {
    pub fn new(storage: Arc<dyn StorageService>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Presign a GET for an object the poller has found. One attempt, no retry.
    pub async fn issue(
        &self,
        bucket: &str,
        object: &FoundObject,
        expires_in: Duration,
    ) -> Result<DownloadLink, PipelineError> {
        let expires_at = chrono::Duration::from_std(expires_in)
            .ok()
            .and_then(|lifetime| self.clock.utc_now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                tracing::error!(
                    "Link lifetime of {}s for {} is out of range",
                    expires_in.as_secs(),
                    object.key()
                );
                PipelineError::LinkGenerationFailed(format!(
                    "link lifetime of {}s is out of range",
                    expires_in.as_secs()
                ))
            })?;

        let url = self
            .storage
            .presign_get(bucket, object.key(), expires_in)
            .await
            .map_err(|e| {
                tracing::error!("Failed to generate presigned URL for {}: {}", object.key(), e);
                PipelineError::LinkGenerationFailed(e.to_string())
            })?;

        tracing::info!(
            "📎 Download link issued for {} (valid {}s)",
            object.key(),
            expires_in.as_secs()
        );

        Ok(DownloadLink { url, expires_at })
    }
}
