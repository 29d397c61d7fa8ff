use crate::services::error::PipelineError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;

/// Output file format requested from the extraction API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    /// "csv" in any case selects CSV, every other tag selects JSON
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("csv") {
            OutputFormat::Csv
        } else {
            OutputFormat::Json
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Name of the file the extraction backend is asked to produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFilename(String);

impl OutputFilename {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutputFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `{profile}_{YYYYMMDD_HHMMSS}.{ext}` with path separators in the profile
/// replaced so the name stays a single storage key segment.
pub fn generate_filename(
    profile: &str,
    format: OutputFormat,
    timestamp: NaiveDateTime,
) -> OutputFilename {
    let sanitized = profile.replace(['/', '\\'], "_");
    OutputFilename(format!(
        "{}_{}.{}",
        sanitized,
        timestamp.format("%Y%m%d_%H%M%S"),
        format.as_str()
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub profile: String,
    pub format: OutputFormat,
    pub number_of_reels: u32,
    pub filename: OutputFilename,
}

impl ExtractionRequest {
    pub fn new(
        profile: impl Into<String>,
        format: OutputFormat,
        number_of_reels: u32,
        filename: OutputFilename,
    ) -> Self {
        Self {
            profile: profile.into(),
            format,
            number_of_reels,
            filename,
        }
    }

    /// Query parameters understood by the extraction API
    pub fn query_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("profile", self.profile.clone()),
            ("file_format", self.format.as_str().to_string()),
            ("number_of_reels", self.number_of_reels.to_string()),
            ("filename", self.filename.to_string()),
        ]
    }
}

#[async_trait]
pub trait ExtractorClient: Send + Sync {
    /// Submit one extraction job. `Ok` means the API accepted it.
    async fn submit(&self, request: &ExtractionRequest) -> Result<(), PipelineError>;
}

pub struct HttpExtractorClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpExtractorClient {
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ExtractorClient for HttpExtractorClient {
    async fn submit(&self, request: &ExtractionRequest) -> Result<(), PipelineError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&request.query_pairs()[..])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Error calling extraction API: {}", e);
                PipelineError::ApiCallFailed {
                    status: None,
                    reason: format!("error calling API: {}", e),
                }
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "Extraction API rejected the request");
            return Err(PipelineError::ApiCallFailed {
                status: Some(status.as_u16()),
                reason: format!("API responded with status {}", status.as_u16()),
            });
        }

        // The body is not used, but an unparseable one means the call did not go through.
        resp.json::<serde_json::Value>().await.map_err(|e| {
            tracing::error!("Extraction API returned an unreadable body: {}", e);
            PipelineError::ApiCallFailed {
                status: Some(status.as_u16()),
                reason: format!("invalid response body: {}", e),
            }
        })?;

        tracing::info!(
            profile = %request.profile,
            filename = %request.filename,
            "Extraction request accepted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_generate_filename() {
        let filename = generate_filename("@foo", OutputFormat::Csv, noon());
        assert_eq!(filename.as_str(), "@foo_20240101_120000.csv");
    }

    #[test]
    fn test_filename_has_no_path_separators() {
        for profile in [
            "https://www.instagram.com/example",
            "a/b/c",
            "/leading",
            "trailing/",
            "back\\slash",
        ] {
            let filename = generate_filename(profile, OutputFormat::Json, noon());
            assert!(!filename.as_str().contains('/'), "{}", filename);
            assert!(!filename.as_str().contains('\\'), "{}", filename);
        }
        assert_eq!(
            generate_filename("https://www.instagram.com/example", OutputFormat::Csv, noon())
                .as_str(),
            "https:__www.instagram.com_example_20240101_120000.csv"
        );
    }

    #[test]
    fn test_extension_follows_format_tag() {
        for (tag, ext) in [
            ("csv", ".csv"),
            ("CSV", ".csv"),
            ("Csv", ".csv"),
            ("json", ".json"),
            ("xlsx", ".json"),
            ("", ".json"),
        ] {
            let filename = generate_filename("p", OutputFormat::from_tag(tag), noon());
            assert!(filename.as_str().ends_with(ext), "{} -> {}", tag, filename);
        }
    }

    #[test]
    fn test_query_pairs() {
        let filename = generate_filename("@foo", OutputFormat::Csv, noon());
        let request = ExtractionRequest::new("@foo", OutputFormat::Csv, 3, filename);
        assert_eq!(
            request.query_pairs(),
            [
                ("profile", "@foo".to_string()),
                ("file_format", "csv".to_string()),
                ("number_of_reels", "3".to_string()),
                ("filename", "@foo_20240101_120000.csv".to_string()),
            ]
        );
    }
}
