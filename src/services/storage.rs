use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use std::time::Duration;

/// One entry of a listing response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Token for the next listing page. A truncated response without a token ends
/// the listing instead of restarting it from the first page.
fn next_page_token(is_truncated: bool, token: Option<&str>) -> Option<String> {
    if is_truncated {
        token.map(str::to_string)
    } else {
        None
    }
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// List every object of `bucket` whose key starts with `prefix`
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>>;

    /// Presigned GET URL for a single object
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;
}

pub struct S3StorageService {
    client: Client,
}

impl S3StorageService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token)
                .send()
                .await?;

            objects.extend(
                res.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(ObjectEntry::new),
            );

            continuation_token = next_page_token(
                res.is_truncated().unwrap_or(false),
                res.next_continuation_token(),
            );
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(objects)
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)?;

        let res = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await;

        match res {
            Ok(request) => Ok(request.uri().to_string()),
            Err(e) => {
                tracing::error!("S3 presign failed: bucket={}, key={}, error={:?}", bucket, key, e);
                Err(e.into())
            }
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!(service_error))
                }
            }
        }
    }
}
