#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reels_extractor::config::AppConfig;
use reels_extractor::services::clock::ManualClock;
use reels_extractor::services::error::PipelineError;
use reels_extractor::services::extractor::{ExtractionRequest, ExtractorClient};
use reels_extractor::services::pipeline::ExtractionPipeline;
use reels_extractor::services::storage::{ObjectEntry, StorageService};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BUCKET: &str = "reels-results";

pub fn frozen_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn test_config() -> AppConfig {
    AppConfig::new(BUCKET, "http://extractor.test/extract")
}

/// In-memory bucket. Objects can be scheduled to show up on the n-th listing.
pub struct MockStorageService {
    objects: Mutex<Vec<String>>,
    scheduled: Mutex<HashMap<String, usize>>,
    fail_listing: bool,
    fail_presign: bool,
    list_calls: Mutex<Vec<(String, String)>>,
    presign_calls: Mutex<Vec<(String, String, Duration)>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            scheduled: Mutex::new(HashMap::new()),
            fail_listing: false,
            fail_presign: false,
            list_calls: Mutex::new(Vec::new()),
            presign_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_listing() -> Self {
        Self {
            fail_listing: true,
            ..Self::new()
        }
    }

    pub fn failing_presign() -> Self {
        Self {
            fail_presign: true,
            ..Self::new()
        }
    }

    pub fn with_object(self, key: &str) -> Self {
        self.objects.lock().unwrap().push(key.to_string());
        self
    }

    /// `key` is listed from the `attempt`-th listing call on (1-based)
    pub fn with_object_on_attempt(self, key: &str, attempt: usize) -> Self {
        self.scheduled
            .lock()
            .unwrap()
            .insert(key.to_string(), attempt);
        self
    }

    pub fn list_calls(&self) -> Vec<(String, String)> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn presign_calls(&self) -> Vec<(String, String, Duration)> {
        self.presign_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> anyhow::Result<Vec<ObjectEntry>> {
        let attempt = {
            let mut calls = self.list_calls.lock().unwrap();
            calls.push((bucket.to_string(), prefix.to_string()));
            calls.len()
        };

        if self.fail_listing {
            return Err(anyhow::anyhow!("AccessDenied: listing not allowed"));
        }

        let mut keys = self.objects.lock().unwrap().clone();
        for (key, from_attempt) in self.scheduled.lock().unwrap().iter() {
            if attempt >= *from_attempt {
                keys.push(key.clone());
            }
        }

        Ok(keys
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .map(ObjectEntry::new)
            .collect())
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> anyhow::Result<String> {
        self.presign_calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), expires_in));

        if self.fail_presign {
            return Err(anyhow::anyhow!("signing credentials expired"));
        }

        Ok(format!(
            "https://{}.s3.amazonaws.com/{}?X-Amz-Expires={}&X-Amz-Signature=mock",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }

    async fn bucket_exists(&self, _bucket: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Records submitted requests and answers with a fixed result
pub struct MockExtractorClient {
    requests: Mutex<Vec<ExtractionRequest>>,
    failure: Option<PipelineError>,
}

impl MockExtractorClient {
    pub fn accepting() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    pub fn failing_with_status(status: u16) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failure: Some(PipelineError::ApiCallFailed {
                status: Some(status),
                reason: format!("API responded with status {}", status),
            }),
        }
    }

    pub fn requests(&self) -> Vec<ExtractionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractorClient for MockExtractorClient {
    async fn submit(&self, request: &ExtractionRequest) -> Result<(), PipelineError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

pub struct Harness {
    pub pipeline: Arc<ExtractionPipeline>,
    pub storage: Arc<MockStorageService>,
    pub extractor: Arc<MockExtractorClient>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(storage: MockStorageService, extractor: MockExtractorClient) -> Harness {
    harness_with_config(test_config(), storage, extractor)
}

pub fn harness_with_config(
    config: AppConfig,
    storage: MockStorageService,
    extractor: MockExtractorClient,
) -> Harness {
    let storage = Arc::new(storage);
    let extractor = Arc::new(extractor);
    let clock = Arc::new(ManualClock::new(frozen_time()));
    let pipeline = Arc::new(ExtractionPipeline::new(
        config,
        extractor.clone(),
        Some(storage.clone()),
        clock.clone(),
    ));

    Harness {
        pipeline,
        storage,
        extractor,
        clock,
    }
}
