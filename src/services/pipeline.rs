use crate::config::AppConfig;
use crate::services::clock::Clock;
use crate::services::error::PipelineError;
use crate::services::extractor::{ExtractionRequest, ExtractorClient, OutputFormat, generate_filename};
use crate::services::link::{DownloadLink, LinkIssuer};
use crate::services::poller::{PollSettings, ReadinessPoller};
use crate::services::progress::{PipelineEvent, ProgressReporter};
use crate::services::storage::StorageService;
use std::sync::Arc;

/// Result of a successful extraction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub filename: String,
    pub key: String,
    pub link: DownloadLink,
}

/// Request → poll → link, run to completion for one submission.
///
/// Built once at startup and shared between requests; each `run` call keeps
/// its own state.
pub struct ExtractionPipeline {
    config: AppConfig,
    extractor: Arc<dyn ExtractorClient>,
    storage: Option<Arc<dyn StorageService>>,
    clock: Arc<dyn Clock>,
}

impl ExtractionPipeline {
    pub fn new(
        config: AppConfig,
        extractor: Arc<dyn ExtractorClient>,
        storage: Option<Arc<dyn StorageService>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            extractor,
            storage,
            clock,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage(&self) -> Option<&Arc<dyn StorageService>> {
        self.storage.as_ref()
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            max_wait: self.config.max_wait,
            check_interval: self.config.check_interval,
        }
    }

    pub async fn run(
        &self,
        profile: &str,
        format: OutputFormat,
        number_of_reels: u32,
        progress: &dyn ProgressReporter,
    ) -> Result<ExtractionOutcome, PipelineError> {
        // Without storage the result could never be picked up, so do not start a job.
        let storage = self
            .storage
            .clone()
            .ok_or(PipelineError::StorageClientUnavailable)?;
        let bucket = self.config.bucket_name.as_str();

        let filename = generate_filename(profile, format, self.clock.local_timestamp());
        let request = ExtractionRequest::new(profile, format, number_of_reels, filename.clone());
        tracing::info!(
            profile,
            number_of_reels,
            format = format.as_str(),
            filename = %filename,
            "Submitting extraction request"
        );
        self.extractor.submit(&request).await?;
        progress.report(PipelineEvent::Accepted {
            filename: filename.to_string(),
        });

        let key = self.config.result_key(filename.as_str());
        progress.report(PipelineEvent::Waiting { key: key.clone() });

        let found = ReadinessPoller::new(storage.clone(), self.clock.clone())
            .wait_for(bucket, &key, self.poll_settings(), progress)
            .await
            .into_result(&key)?;
        tracing::info!(
            bucket,
            key = %key,
            attempts = found.attempts(),
            waited_secs = found.waited().as_secs(),
            "Result file ready"
        );
        progress.report(PipelineEvent::Ready { key: key.clone() });

        let link = LinkIssuer::new(storage, self.clock.clone())
            .issue(bucket, &found, self.config.link_expiration)
            .await?;

        Ok(ExtractionOutcome {
            filename: filename.to_string(),
            key,
            link,
        })
    }
}
