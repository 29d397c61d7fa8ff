use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Highest reel count the extraction API accepts
pub const MAX_REELS: u32 = 10;

/// Shortest pause between two storage checks
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Longest lifetime S3 accepts for a presigned URL (7 days)
pub const MAX_LINK_EXPIRATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Object storage connection settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Endpoint override for S3-compatible services such as MinIO
    pub endpoint_url: Option<String>,

    /// Region (default: "us-east-1")
    pub region: String,

    /// Static access key. When absent the default AWS provider chain is used.
    pub access_key: Option<String>,

    /// Static secret key
    pub secret_key: Option<String>,

    /// Use path-style addressing (default: false)
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
            force_path_style: false,
        }
    }
}

/// Application configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bucket the extraction backend writes its results to
    pub bucket_name: String,

    /// Extraction API endpoint
    pub api_endpoint: String,

    /// Prefix the backend puts in front of the requested filename (default: "transcription_")
    pub result_key_prefix: String,

    /// Maximum time to wait for the result file (default: 900s)
    pub max_wait: Duration,

    /// Delay between two storage checks (default: 5s)
    pub check_interval: Duration,

    /// Lifetime of the issued download link (default: 24h)
    pub link_expiration: Duration,

    /// Optional timeout for the extraction API call
    pub api_timeout: Option<Duration>,

    pub storage: StorageConfig,
}

impl AppConfig {
    /// Build a config with defaults for everything but the bucket and endpoint
    pub fn new(bucket_name: impl Into<String>, api_endpoint: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            api_endpoint: api_endpoint.into(),
            result_key_prefix: "transcription_".to_string(),
            max_wait: Duration::from_secs(900),
            check_interval: Duration::from_secs(5),
            link_expiration: Duration::from_secs(86400),
            api_timeout: None,
            storage: StorageConfig::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let bucket_name = env::var("BUCKET_S3").context("BUCKET_S3 must be set")?;
        let api_endpoint = env::var("API_ENDPOINT").context("API_ENDPOINT must be set")?;
        let default = Self::new(bucket_name, api_endpoint);

        Ok(Self {
            result_key_prefix: env::var("RESULT_KEY_PREFIX")
                .unwrap_or(default.result_key_prefix),

            max_wait: env::var("POLL_MAX_WAIT_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .map(secs_clamped)
                .unwrap_or(default.max_wait),

            check_interval: env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .map(interval_clamped)
                .unwrap_or(default.check_interval),

            link_expiration: env::var("LINK_EXPIRATION_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(link_expiration_clamped)
                .unwrap_or(default.link_expiration),

            api_timeout: env::var("API_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),

            storage: StorageConfig {
                endpoint_url: env::var("S3_ENDPOINT_URL").ok().filter(|v| !v.is_empty()),
                region: env::var("AWS_REGION").unwrap_or(default.storage.region),
                access_key: env::var("S3_ACCESS_KEY").ok(),
                secret_key: env::var("S3_SECRET_KEY").ok(),
                force_path_style: env::var("S3_FORCE_PATH_STYLE")
                    .map(|v| v.to_lowercase() == "true" || v == "1")
                    .unwrap_or(default.storage.force_path_style),
            },

            ..default
        })
    }

    /// Storage key the backend writes for a requested filename
    pub fn result_key(&self, filename: &str) -> String {
        format!("{}{}", self.result_key_prefix, filename)
    }
}

// Negative waits behave like zero: the poll loop never runs.
fn secs_clamped(secs: i64) -> Duration {
    Duration::from_secs(secs.max(0) as u64)
}

// A zero interval would list the bucket back to back for the whole window.
fn interval_clamped(secs: i64) -> Duration {
    secs_clamped(secs).max(MIN_CHECK_INTERVAL)
}

fn link_expiration_clamped(secs: u64) -> Duration {
    let requested = Duration::from_secs(secs);
    if requested > MAX_LINK_EXPIRATION {
        tracing::warn!(
            "LINK_EXPIRATION_SECS={} exceeds the presign limit, using {}s",
            secs,
            MAX_LINK_EXPIRATION.as_secs()
        );
    }
    requested.min(MAX_LINK_EXPIRATION)
}
