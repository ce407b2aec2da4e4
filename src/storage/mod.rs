use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::{header::CONTENT_TYPE, Client};
use std::{io, sync::Arc};

use crate::config::{Config, StorageBackend};
use crate::errors::{AppError, Result};

pub mod local;
pub mod s3;

pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Writes the whole stream under `key`, replacing any existing object.
    async fn put_stream(&self, key: &str, content_type: &str, body: ByteStream) -> Result<()>;

    fn public_url(&self, key: &str) -> String;
}

pub fn create_storage(config: &Config) -> Result<Arc<dyn ObjectStorage>> {
    match config.storage_backend {
        StorageBackend::Local => {
            let storage = local::LocalStorage::new(&config.local_storage_dir, &config.image_host)?;
            Ok(Arc::new(storage))
        }
        StorageBackend::S3 => {
            let storage = s3::S3Storage::new(
                config.s3_endpoint.as_deref(),
                &config.s3_region,
                &config.s3_access_key,
                &config.s3_secret_key,
                &config.s3_bucket,
                &config.image_host,
            );
            Ok(Arc::new(storage))
        }
    }
}

/// Percent-encodes like a browser's `encodeURIComponent`.
pub fn encode_uri_component(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

/// Object key for a generated wallpaper. Identical descriptions map to the
/// same key, so a later upload replaces the earlier asset.
pub fn wallpaper_key(description: &str) -> String {
    format!("wallpapers/{}.png", encode_uri_component(description))
}

/// Streams the image at `source_url` into `storage` under `key` and returns
/// the object's public URL.
pub async fn transfer_from_url(
    client: &Client,
    storage: &dyn ObjectStorage,
    source_url: &str,
    key: &str,
) -> Result<String> {
    let response = client
        .get(source_url)
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("Failed to download {}: {}", source_url, e)))?;

    if !response.status().is_success() {
        return Err(AppError::Storage(format!(
            "Source {} returned status {}",
            source_url,
            response.status()
        )));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| mime::IMAGE_PNG.to_string());

    let body = response
        .bytes_stream()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .boxed();

    storage.put_stream(key, &content_type, body).await?;

    tracing::info!(key, "Stored generated image");
    Ok(storage.public_url(key))
}
