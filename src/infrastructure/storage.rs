use crate::config::StorageConfig;
use crate::services::storage::S3StorageService;
use anyhow::{Result, bail};
use aws_sdk_s3::config::{Credentials, Region};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &StorageConfig) -> Result<Arc<S3StorageService>> {
    let mut loader = aws_config::from_env().region(Region::new(config.region.clone()));

    if let Some(endpoint_url) = &config.endpoint_url {
        info!("☁️  S3 Storage endpoint: {}", endpoint_url);
        loader = loader.endpoint_url(endpoint_url);
    }

    match (&config.access_key, &config.secret_key) {
        (Some(access_key), Some(secret_key)) => {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "static",
            ));
        }
        (None, None) => info!("🔑 Using the default AWS credential chain"),
        _ => bail!("S3_ACCESS_KEY and S3_SECRET_KEY must be set together"),
    }

    let aws_config = loader.load().await;
    if aws_config.credentials_provider().is_none() {
        bail!("no AWS credentials provider available");
    }

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.force_path_style)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    Ok(Arc::new(S3StorageService::new(s3_client)))
}
