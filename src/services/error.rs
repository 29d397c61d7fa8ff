use thiserror::Error;

/// Terminal failure of one extraction request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Storage client is not initialized, cannot check the bucket")]
    StorageClientUnavailable,

    #[error("Extraction API request failed: {reason}")]
    ApiCallFailed { status: Option<u16>, reason: String },

    #[error("Unexpected error while checking storage: {0}")]
    StorageListError(String),

    #[error("Timed out after {waited_secs}s, file '{key}' not found")]
    PollTimeout { key: String, waited_secs: u64 },

    #[error("Failed to generate download link: {0}")]
    LinkGenerationFailed(String),
}

impl PipelineError {
    /// Message safe to show to the person who submitted the form
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::StorageListError(_) => {
                "Unexpected error while checking storage. Please try again later.".to_string()
            }
            PipelineError::LinkGenerationFailed(_) => {
                "The file is ready but the download link could not be generated.".to_string()
            }
            other => other.to_string(),
        }
    }
}
